// ── Value subscriptions ──
//
// Subscription type handed out by `observe()`. Backed by a per-subscriber
// unbounded channel, so nothing published after subscription is skipped.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::holder::{Revision, ValueState};

/// A subscription to the synchronized value.
///
/// The first item is the state that was current when the subscription was
/// created, followed by every later publish in order. Dropping the stream
/// unsubscribes.
pub struct ValueStream<T> {
    current: ValueState<T>,
    inner: UnboundedReceiverStream<Revision<T>>,
}

impl<T> ValueStream<T> {
    pub(crate) fn new(initial: ValueState<T>, receiver: mpsc::UnboundedReceiver<Revision<T>>) -> Self {
        Self {
            current: initial,
            inner: UnboundedReceiverStream::new(receiver),
        }
    }

    /// The state most recently yielded by this stream, or the state captured
    /// at subscription time if nothing has been consumed yet.
    pub fn current(&self) -> &ValueState<T> {
        &self.current
    }

    /// Wait for the next state in the sequence.
    /// Returns `None` once the synchronizer has been dropped.
    pub async fn changed(&mut self) -> Option<ValueState<T>> {
        self.next().await
    }
}

impl<T> Stream for ValueStream<T> {
    type Item = ValueState<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Both fields are Unpin (channel handle and `Arc`), so `get_mut` is fine.
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(revision)) => {
                this.current = revision.state.clone();
                Poll::Ready(Some(revision.state))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
