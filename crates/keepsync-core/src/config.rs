// ── Runtime synchronizer configuration ──
//
// Describes how a `Synchronizer` behaves at runtime. It never touches
// disk; the CLI or host builds one (usually via `keepsync-config`) and
// hands it in.

use std::time::Duration;

/// Configuration for a single [`Synchronizer`](crate::Synchronizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Label attached to every log line emitted for this value.
    pub name: String,
    /// Upper bound on a single `save()` call. An elapsed timeout counts as
    /// a failed write. `None` waits as long as the store takes.
    pub save_timeout: Option<Duration>,
}

impl SyncConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_save_timeout(mut self, timeout: Duration) -> Self {
        self.save_timeout = Some(timeout);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            save_timeout: None,
        }
    }
}
