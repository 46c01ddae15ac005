//! Observable in-memory value backed by a durable single-value store.
//!
//! This crate bridges one persisted value with a live, multi-subscriber view
//! of it:
//!
//! - **[`Synchronizer`]**: Central facade. Construction spawns a one-shot
//!   init task that loads the value from a [`ValueStore`] and a long-lived
//!   persistence sink that writes every later update back. [`set()`]
//!   waits for the load once, then publishes without waiting on storage.
//!
//! - **Value holder**: The observable state cell. A `tokio::sync::watch`
//!   channel keeps the current revision for non-suspending reads; a registry
//!   of per-subscriber channels gives every observer the full, gap-free
//!   sequence of publishes.
//!
//! - **[`ValueStream<T>`]**: Subscription handle vended by `observe()`.
//!   Exposes `current()` / `changed()` and implements `Stream`.
//!
//! - **Persistence sink**: Single-flight, coalescing writer. While a save is
//!   in flight, newer values replace each other; only the newest one is
//!   written next.
//!
//! - **Stores** ([`store`]): The [`ValueStore`] collaborator trait plus an
//!   in-process [`MemoryStore`] and a [`JsonFileStore`].
//!
//! [`set()`]: Synchronizer::set

pub mod config;
pub mod error;
pub mod store;
pub mod stream;
pub mod synchronizer;

mod holder;
mod init;
mod sink;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SyncConfig;
pub use error::{CoreError, StoreError};
pub use holder::ValueState;
pub use init::InitState;
pub use sink::SinkStatus;
pub use store::{JsonFileStore, MemoryStore, ValueStore};
pub use stream::ValueStream;
pub use synchronizer::Synchronizer;
