// ── Observable value cell ──
//
// Holds the current value and fans every publish out to subscribers.
// `watch` gives wait-free reads of the latest revision; the subscriber
// registry gives each observer the complete sequence with no skips.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::stream::ValueStream;

/// Sequence number of the revision produced by the initial load.
/// Revision 0 is the pre-load state, everything above is a `set`.
pub(crate) const LOAD_SEQ: u64 = 1;

/// What a consumer can observe about the synchronized value.
#[derive(Debug, PartialEq, Eq)]
pub enum ValueState<T> {
    /// The initial load has not finished yet.
    Unloaded,
    /// The load finished and the store had no value.
    Absent,
    /// A value, either loaded or set.
    Present(Arc<T>),
}

impl<T> ValueState<T> {
    /// `true` once the initial load has been published.
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::Unloaded)
    }

    /// The value, if there is one.
    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            Self::Present(value) => Some(value),
            Self::Unloaded | Self::Absent => None,
        }
    }
}

impl<T> Clone for ValueState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Unloaded => Self::Unloaded,
            Self::Absent => Self::Absent,
            Self::Present(value) => Self::Present(Arc::clone(value)),
        }
    }
}

/// One publish event. `seq` identifies the event; two revisions carrying
/// equal values are still distinct if their sequence numbers differ.
#[derive(Debug)]
pub(crate) struct Revision<T> {
    pub(crate) seq: u64,
    pub(crate) state: ValueState<T>,
}

impl<T> Revision<T> {
    /// Whether this revision came from a `set` (and so needs persisting).
    pub(crate) fn is_update(&self) -> bool {
        self.seq > LOAD_SEQ
    }
}

impl<T> Clone for Revision<T> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq,
            state: self.state.clone(),
        }
    }
}

/// The current value holder.
///
/// Publishes and subscriptions are serialized by the registry lock, so a
/// subscriber always starts from the revision current at subscription time
/// and then receives every later revision in publish order.
pub(crate) struct ValueHolder<T> {
    /// Latest revision, readable without suspending.
    current: watch::Sender<Revision<T>>,

    /// One unbounded channel per live subscriber.
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Revision<T>>>>,
}

impl<T: Send + Sync + 'static> ValueHolder<T> {
    pub(crate) fn new() -> Self {
        let (current, _) = watch::channel(Revision {
            seq: 0,
            state: ValueState::Unloaded,
        });

        Self {
            current,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// The latest published state.
    pub(crate) fn current(&self) -> ValueState<T> {
        self.current.borrow().state.clone()
    }

    /// Sequence number of the latest publish.
    pub(crate) fn current_seq(&self) -> u64 {
        self.current.borrow().seq
    }

    /// Subscribe with a public stream handle.
    pub(crate) fn subscribe(&self) -> ValueStream<T> {
        let (initial, rx) = self.register();
        ValueStream::new(initial.state, rx)
    }

    /// Subscribe to raw revisions. The first item is the current revision.
    pub(crate) fn subscribe_revisions(&self) -> mpsc::UnboundedReceiver<Revision<T>> {
        self.register().1
    }

    fn register(&self) -> (Revision<T>, mpsc::UnboundedReceiver<Revision<T>>) {
        let mut subscribers = self.subscribers.lock();
        let initial = self.current.borrow().clone();
        let (tx, rx) = mpsc::unbounded_channel();
        // Cannot fail: we still hold `rx`.
        let _ = tx.send(initial.clone());
        subscribers.push(tx);
        (initial, rx)
    }

    /// Replace the current state and emit it to every subscriber.
    /// Returns the sequence number assigned to this publish.
    pub(crate) fn publish(&self, state: ValueState<T>) -> u64 {
        let mut subscribers = self.subscribers.lock();

        let mut seq = 0;
        // `send_modify` updates unconditionally, even with zero receivers.
        self.current.send_modify(|revision| {
            revision.seq += 1;
            revision.state = state;
            seq = revision.seq;
        });

        let revision = self.current.borrow().clone();
        subscribers.retain(|tx| tx.send(revision.clone()).is_ok());
        seq
    }

    /// Number of subscribers that have not been dropped.
    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn present(v: &str) -> ValueState<String> {
        ValueState::Present(Arc::new(v.to_owned()))
    }

    #[test]
    fn starts_unloaded() {
        let holder: ValueHolder<String> = ValueHolder::new();
        assert_eq!(holder.current(), ValueState::Unloaded);
        assert_eq!(holder.current_seq(), 0);
    }

    #[test]
    fn publish_assigns_increasing_sequence_numbers() {
        let holder: ValueHolder<String> = ValueHolder::new();
        assert_eq!(holder.publish(ValueState::Absent), LOAD_SEQ);
        assert_eq!(holder.publish(present("a")), 2);
        assert_eq!(holder.publish(present("a")), 3);
        assert_eq!(holder.current(), present("a"));
    }

    #[test]
    fn subscriber_sees_current_then_every_publish() {
        let holder: ValueHolder<String> = ValueHolder::new();
        let mut rx = holder.subscribe_revisions();

        holder.publish(ValueState::Absent);
        holder.publish(present("a"));
        holder.publish(present("b"));

        let seen: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|r| (r.seq, r.state))
            .collect();
        assert_eq!(
            seen,
            vec![
                (0, ValueState::Unloaded),
                (1, ValueState::Absent),
                (2, present("a")),
                (3, present("b")),
            ]
        );
    }

    #[test]
    fn late_subscriber_starts_from_current_revision() {
        let holder: ValueHolder<String> = ValueHolder::new();
        holder.publish(present("loaded"));
        holder.publish(present("x"));

        let mut rx = holder.subscribe_revisions();
        let first = rx.try_recv().unwrap();
        assert_eq!(first.seq, 2);
        assert_eq!(first.state, present("x"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let holder: ValueHolder<String> = ValueHolder::new();
        let keep = holder.subscribe_revisions();
        let gone = holder.subscribe_revisions();
        assert_eq!(holder.subscriber_count(), 2);

        drop(gone);
        holder.publish(ValueState::Absent);
        assert_eq!(holder.subscriber_count(), 1);
        drop(keep);
    }

    #[test]
    fn revision_identity_is_sequence_not_value() {
        let a = Revision {
            seq: 2,
            state: present("same"),
        };
        let b = Revision {
            seq: 3,
            state: present("same"),
        };
        assert_eq!(a.state, b.state);
        assert_ne!(a.seq, b.seq);
        assert!(a.is_update());
        assert!(
            !Revision::<String> {
                seq: LOAD_SEQ,
                state: ValueState::Absent
            }
            .is_update()
        );
    }
}
