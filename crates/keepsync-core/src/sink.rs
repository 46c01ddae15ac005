// ── Persistence sink ──
//
// Consumes the holder's revision sequence and writes updates back to the
// store. At most one `save()` is in flight. Revisions that arrive while a
// write is running are collapsed: only the newest is written next.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::SyncConfig;
use crate::error::StoreError;
use crate::holder::{Revision, ValueState};
use crate::store::ValueStore;

/// Observable state of the persistence sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStatus {
    /// Sequence number of the revision currently being written.
    pub writing: Option<u64>,
    /// Highest revision whose persistence has been attempted to completion.
    /// Revisions skipped by coalescing are settled by the write that replaced them.
    pub settled_seq: u64,
    /// Highest revision that was successfully written. Everything at or
    /// below it is durable.
    pub written_seq: u64,
    /// Successful writes.
    pub writes: u64,
    /// Failed writes, including timeouts.
    pub failures: u64,
    /// Revisions dropped from persistence because a newer one superseded them.
    pub coalesced: u64,
    /// Error from the most recent write, cleared by the next success.
    pub last_error: Option<String>,
}

impl SinkStatus {
    pub fn is_idle(&self) -> bool {
        self.writing.is_none()
    }

    /// Outcome of persisting revision `seq`, once it has settled.
    ///
    /// A later successful write also covers `seq`; a later failure does not
    /// undo an earlier success.
    pub fn outcome_for(&self, seq: u64) -> Option<Result<(), String>> {
        if self.settled_seq < seq {
            return None;
        }
        if self.written_seq >= seq {
            return Some(Ok(()));
        }
        Some(Err(self
            .last_error
            .clone()
            .unwrap_or_else(|| format!("revision {seq} was not written"))))
    }
}

/// The background writer. Owned by its task; dropped when the task ends.
pub(crate) struct PersistenceSink<T, S> {
    pub(crate) config: SyncConfig,
    pub(crate) store: Arc<S>,
    pub(crate) revisions: mpsc::UnboundedReceiver<Revision<T>>,
    pub(crate) status: watch::Sender<SinkStatus>,
    pub(crate) cancel: CancellationToken,
}

impl<T, S> PersistenceSink<T, S>
where
    T: Send + Sync + 'static,
    S: ValueStore<T>,
{
    /// Run until cancelled or until the holder is gone.
    pub(crate) async fn run(mut self) {
        while let Some(first) = self.next_update().await {
            // Idle -> Writing(first). Each completed write drains whatever
            // arrived meanwhile and continues with the newest, if any.
            let mut job = first;
            loop {
                if !self.write(&job).await {
                    debug!(name = %self.config.name, "persistence sink cancelled mid-write");
                    return;
                }
                match self.take_latest() {
                    Some(next) => job = next,
                    None => break,
                }
            }
        }
        debug!(name = %self.config.name, "persistence sink stopped");
    }

    /// Wait for the next revision that needs persisting. The load result
    /// and the pre-load state are skipped; they are already durable.
    async fn next_update(&mut self) -> Option<Revision<T>> {
        loop {
            let revision = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                revision = self.revisions.recv() => revision?,
            };
            if revision.is_update() {
                return Some(revision);
            }
        }
    }

    /// Drain everything already queued and keep only the newest update.
    fn take_latest(&mut self) -> Option<Revision<T>> {
        let mut latest: Option<Revision<T>> = None;
        let mut skipped = 0u64;
        while let Ok(revision) = self.revisions.try_recv() {
            if revision.is_update() && latest.replace(revision).is_some() {
                skipped += 1;
            }
        }
        if skipped > 0 {
            trace!(name = %self.config.name, skipped, "coalesced pending revisions");
            self.status.send_modify(|s| s.coalesced += skipped);
        }
        latest
    }

    /// Persist one revision. Returns `false` if cancelled before the store
    /// answered; failures are recorded and do not stop the sink.
    ///
    /// A save that outlives `save_timeout` is reported as failed right away,
    /// but the slot stays taken until the store actually returns: dropping
    /// the future would not stop I/O already handed to another thread.
    async fn write(&self, revision: &Revision<T>) -> bool {
        let seq = revision.seq;
        let ValueState::Present(ref value) = revision.state else {
            // Updates always carry a value; nothing to write otherwise.
            self.status.send_modify(|s| s.settled_seq = seq);
            return true;
        };

        self.status.send_modify(|s| s.writing = Some(seq));
        trace!(name = %self.config.name, seq, "writing value");

        let save = self.store.save(value);
        tokio::pin!(save);

        let result = match self.config.save_timeout {
            None => tokio::select! {
                biased;
                () = self.cancel.cancelled() => return false,
                result = &mut save => result,
            },
            Some(limit) => tokio::select! {
                biased;
                () = self.cancel.cancelled() => return false,
                timed = tokio::time::timeout(limit, &mut save) => {
                    timed.unwrap_or_else(|_| Err(StoreError::Timeout {
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    }))
                }
            },
        };

        // A timed-out save still owns the slot.
        let timed_out = matches!(result, Err(StoreError::Timeout { .. }));
        self.record(seq, result, !timed_out);

        if timed_out {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return false,
                late = &mut save => {
                    debug!(name = %self.config.name, seq, ok = late.is_ok(), "timed-out save finished");
                }
            }
            self.status.send_modify(|s| s.writing = None);
        }
        true
    }

    /// Publish the outcome of the write for `seq`, releasing the slot in the
    /// same update when `release` is set.
    fn record(&self, seq: u64, result: Result<(), StoreError>, release: bool) {
        let error = match result {
            Ok(()) => {
                debug!(name = %self.config.name, seq, "value persisted");
                None
            }
            Err(e) => {
                warn!(name = %self.config.name, seq, error = %e, "persisting value failed");
                Some(e.to_string())
            }
        };
        self.status.send_modify(|s| {
            s.settled_seq = seq;
            if error.is_none() {
                s.written_seq = seq;
                s.writes += 1;
            } else {
                s.failures += 1;
            }
            s.last_error = error;
            if release {
                s.writing = None;
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::holder::ValueHolder;
    use crate::store::MemoryStore;

    struct Harness {
        holder: ValueHolder<&'static str>,
        store: MemoryStore<&'static str>,
        status: watch::Receiver<SinkStatus>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    fn harness(store: MemoryStore<&'static str>, config: SyncConfig) -> Harness {
        let holder = ValueHolder::new();
        let (status_tx, status) = watch::channel(SinkStatus::default());
        let cancel = CancellationToken::new();
        let sink = PersistenceSink {
            config,
            store: Arc::new(store.clone()),
            revisions: holder.subscribe_revisions(),
            status: status_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(sink.run());
        Harness {
            holder,
            store,
            status,
            cancel,
            task,
        }
    }

    fn present(v: &'static str) -> ValueState<&'static str> {
        ValueState::Present(Arc::new(v))
    }

    async fn settled(status: &mut watch::Receiver<SinkStatus>, seq: u64) -> SinkStatus {
        status
            .wait_for(|s| s.settled_seq >= seq)
            .await
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn loaded_value_is_never_written() {
        let mut h = harness(MemoryStore::new(), SyncConfig::default());
        h.holder.publish(present("loaded"));
        let seq = h.holder.publish(present("a"));
        settled(&mut h.status, seq).await;
        assert_eq!(h.store.save_calls(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn updates_during_a_write_collapse_to_the_newest() {
        let store = MemoryStore::new().with_save_delay(Duration::from_millis(1000));
        let mut h = harness(store, SyncConfig::default());
        h.holder.publish(ValueState::Absent);
        h.holder.publish(present("v1"));
        h.holder.publish(present("v2"));
        h.holder.publish(present("v3"));
        let last = h.holder.publish(present("v4"));

        let status = settled(&mut h.status, last).await;
        assert_eq!(h.store.save_calls(), vec!["v1", "v4"]);
        assert_eq!(status.writes, 2);
        assert_eq!(status.coalesced, 2);
        assert!(status.is_idle());
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_the_sink() {
        let mut h = harness(MemoryStore::new(), SyncConfig::default());
        h.store.fail_next_saves(1);
        h.holder.publish(ValueState::Absent);

        let first = h.holder.publish(present("a"));
        let status = settled(&mut h.status, first).await;
        assert_eq!(status.failures, 1);
        assert_eq!(status.last_error.as_deref(), Some("injected save failure"));

        let second = h.holder.publish(present("b"));
        let status = settled(&mut h.status, second).await;
        assert_eq!(status.writes, 1);
        assert_eq!(status.last_error, None);
        assert_eq!(h.store.stored(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_write_times_out() {
        let store = MemoryStore::new().with_save_delay(Duration::from_secs(10));
        let config = SyncConfig::default().with_save_timeout(Duration::from_millis(50));
        let mut h = harness(store, config);
        h.holder.publish(ValueState::Absent);
        let seq = h.holder.publish(present("slow"));

        let status = settled(&mut h.status, seq).await;
        assert_eq!(status.failures, 1);
        assert_eq!(
            status.last_error.as_deref(),
            Some("store operation timed out after 50ms")
        );
        assert_eq!(h.store.stored(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_write_keeps_the_slot_until_the_store_returns() {
        let store = MemoryStore::new().with_save_delay(Duration::from_millis(1000));
        let config = SyncConfig::default().with_save_timeout(Duration::from_millis(50));
        let mut h = harness(store, config);
        h.holder.publish(ValueState::Absent);
        let first = h.holder.publish(present("v1"));
        let second = h.holder.publish(present("v2"));

        let status = settled(&mut h.status, first).await;
        assert_eq!(status.failures, 1);
        assert_eq!(status.writing, Some(first));

        // v2 only starts once v1 has really landed, so v1 is stored by the
        // time v2 times out in turn.
        let status = settled(&mut h.status, second).await;
        assert_eq!(status.failures, 2);
        assert_eq!(h.store.stored(), Some("v1"));
        assert_eq!(h.store.save_calls(), vec!["v1", "v2"]);
        assert_eq!(h.store.max_in_flight(), 1);
    }

    #[test]
    fn outcome_for_prefers_a_covering_success() {
        let status = SinkStatus {
            settled_seq: 5,
            written_seq: 4,
            failures: 1,
            last_error: Some("disk full".into()),
            ..SinkStatus::default()
        };
        assert_eq!(status.outcome_for(6), None);
        assert_eq!(status.outcome_for(3), Some(Ok(())));
        assert_eq!(status.outcome_for(4), Some(Ok(())));
        assert_eq!(status.outcome_for(5), Some(Err("disk full".into())));
    }

    #[tokio::test]
    async fn cancellation_stops_the_task() {
        let h = harness(MemoryStore::new(), SyncConfig::default());
        h.cancel.cancel();
        h.task.await.unwrap();
        h.holder.publish(ValueState::Absent);
        h.holder.publish(present("late"));
        assert!(h.store.save_calls().is_empty());
    }
}
