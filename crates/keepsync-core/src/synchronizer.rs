// ── Synchronizer facade ──
//
// Owns the value holder and both background tasks. Reads and
// subscriptions go straight to the holder; `set` waits for the initial
// load once, then publishes without touching storage.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace};

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::holder::{LOAD_SEQ, ValueHolder, ValueState};
use crate::init::{self, InitState};
use crate::sink::{PersistenceSink, SinkStatus};
use crate::store::ValueStore;
use crate::stream::ValueStream;

// ── Synchronizer ─────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SyncInner>`. Dropping the last clone cancels
/// both background tasks; [`shutdown()`](Self::shutdown) does the same and
/// also waits for them to finish.
pub struct Synchronizer<T> {
    inner: Arc<SyncInner<T>>,
}

struct SyncInner<T> {
    config: SyncConfig,
    holder: Arc<ValueHolder<T>>,
    init_state: watch::Receiver<InitState>,
    sink_status: watch::Receiver<SinkStatus>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    _cancel_on_drop: DropGuard,
}

impl<T> Clone for Synchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Synchronizer<T> {
    /// Create a synchronizer over `store` and start loading immediately.
    ///
    /// Never blocks: the load and all writes happen on spawned tasks.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new<S: ValueStore<T>>(store: S, config: SyncConfig) -> Self {
        let store = Arc::new(store);
        let holder = Arc::new(ValueHolder::new());
        let cancel = CancellationToken::new();

        // Subscribe the sink before the load can publish anything.
        let revisions = holder.subscribe_revisions();
        let (init_tx, init_state) = watch::channel(InitState::Pending);
        let (status_tx, sink_status) = watch::channel(SinkStatus::default());

        let init_handle = tokio::spawn(init::init_task(
            config.name.clone(),
            Arc::clone(&store),
            Arc::clone(&holder),
            init_tx,
            cancel.clone(),
        ));

        let sink = PersistenceSink {
            config: config.clone(),
            store,
            revisions,
            status: status_tx,
            cancel: cancel.clone(),
        };
        let sink_handle = tokio::spawn(sink.run());

        debug!(name = %config.name, "synchronizer started");

        Self {
            inner: Arc::new(SyncInner {
                config,
                holder,
                init_state,
                sink_status,
                _cancel_on_drop: cancel.clone().drop_guard(),
                cancel,
                task_handles: Mutex::new(vec![init_handle, sink_handle]),
            }),
        }
    }

    /// Access the synchronizer configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ── Reads ────────────────────────────────────────────────────

    /// The latest known state. Never suspends.
    pub fn current_value(&self) -> ValueState<T> {
        self.inner.holder.current()
    }

    /// Subscribe to the value. The stream starts with the current state and
    /// then yields every update, in publish order, without skipping any.
    pub fn observe(&self) -> ValueStream<T> {
        self.inner.holder.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Publish a new value.
    ///
    /// Waits for the initial load if it has not finished, so the loaded
    /// value is always observed first. Does not wait for persistence.
    pub async fn set(&self, value: T) -> Result<(), CoreError> {
        self.await_init().await?;
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let seq = self
            .inner
            .holder
            .publish(ValueState::Present(Arc::new(value)));
        trace!(name = %self.inner.config.name, seq, "value published");
        Ok(())
    }

    /// Wait for the initial load to finish. Returns immediately if it
    /// already has; never triggers another load.
    pub async fn await_init(&self) -> Result<(), CoreError> {
        init::await_completion(self.inner.init_state.clone()).await
    }

    /// Wait until every value published before this call has been handled
    /// by the persistence sink.
    ///
    /// Returns [`CoreError::SaveFailed`] if the write that settled it failed.
    pub async fn flush(&self) -> Result<(), CoreError> {
        let target = self.inner.holder.current_seq();
        if target <= LOAD_SEQ {
            return Ok(());
        }

        let mut status = self.inner.sink_status.clone();
        let settled = status
            .wait_for(|s| s.settled_seq >= target)
            .await
            .map(|s| s.clone())
            .map_err(|_| CoreError::Cancelled)?;

        match settled.outcome_for(target) {
            Some(Err(message)) => Err(CoreError::SaveFailed { message }),
            _ => Ok(()),
        }
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to the lifecycle of the initial load.
    pub fn init_state(&self) -> watch::Receiver<InitState> {
        self.inner.init_state.clone()
    }

    /// Subscribe to persistence progress and failures.
    pub fn persistence_status(&self) -> watch::Receiver<SinkStatus> {
        self.inner.sink_status.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Cancel both background tasks and wait for them to finish.
    ///
    /// A write in flight at this point is abandoned, not rolled back.
    /// Pending and later `set` calls fail with [`CoreError::Cancelled`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!(name = %self.inner.config.name, "synchronizer shut down");
    }
}
