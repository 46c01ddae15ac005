// ── One-shot initial load ──
//
// Loads the value from the store exactly once, publishes it, then marks
// the init state terminal. Anything waiting on `InitState` is released
// only after the loaded value is already visible in the holder.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::holder::{ValueHolder, ValueState};
use crate::store::ValueStore;

/// Lifecycle of the initial load, observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    Pending,
    Running,
    Completed,
    Failed { message: String },
    Cancelled,
}

impl InitState {
    /// `true` once the load has finished one way or another.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Cancelled
        )
    }

    /// What a waiter should get back. `None` while still pending or running.
    pub(crate) fn outcome(&self) -> Option<Result<(), CoreError>> {
        match self {
            Self::Pending | Self::Running => None,
            Self::Completed => Some(Ok(())),
            Self::Failed { message } => Some(Err(CoreError::LoadFailed {
                message: message.clone(),
            })),
            Self::Cancelled => Some(Err(CoreError::Cancelled)),
        }
    }
}

/// Wait until the init task has finished and return its outcome.
///
/// Returns immediately when it already has. A closed channel without a
/// terminal state means the task was torn down mid-flight.
pub(crate) async fn await_completion(
    mut state: watch::Receiver<InitState>,
) -> Result<(), CoreError> {
    state
        .wait_for(InitState::is_terminal)
        .await
        .ok()
        .and_then(|terminal| terminal.outcome())
        .unwrap_or(Err(CoreError::Cancelled))
}

/// Load the initial value and publish it.
pub(crate) async fn init_task<T, S>(
    name: String,
    store: Arc<S>,
    holder: Arc<ValueHolder<T>>,
    state: watch::Sender<InitState>,
    cancel: CancellationToken,
) where
    T: Send + Sync + 'static,
    S: ValueStore<T>,
{
    state.send_replace(InitState::Running);
    debug!(%name, "loading initial value");

    let loaded = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(%name, "initial load cancelled");
            state.send_replace(InitState::Cancelled);
            return;
        }
        loaded = store.load() => loaded,
    };

    match loaded {
        Ok(value) => {
            let present = value.is_some();
            let initial = value.map_or(ValueState::Absent, |v| ValueState::Present(Arc::new(v)));
            // Publish before completing: no `set` may overtake the loaded value.
            holder.publish(initial);
            state.send_replace(InitState::Completed);
            debug!(%name, present, "initial value loaded");
        }
        Err(e) => {
            warn!(%name, error = %e, "initial load failed");
            state.send_replace(InitState::Failed {
                message: e.to_string(),
            });
        }
    }
}
