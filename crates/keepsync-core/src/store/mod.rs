// ── Durable single-value stores ──
//
// The collaborator contract the synchronizer is written against, plus
// two implementations: in-process (tests, demos) and a JSON file.

mod file;
mod memory;

use std::future::Future;

use crate::error::StoreError;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Durable storage for exactly one value of type `T`.
///
/// The synchronizer calls [`load`](Self::load) once per lifetime and never
/// has two [`save`](Self::save) calls in flight at the same time, so
/// implementations need no write ordering of their own.
pub trait ValueStore<T>: Send + Sync + 'static {
    /// Read the stored value. `Ok(None)` means nothing has been stored yet.
    fn load(&self) -> impl Future<Output = Result<Option<T>, StoreError>> + Send;

    /// Replace the stored value.
    fn save(&self, value: &T) -> impl Future<Output = Result<(), StoreError>> + Send;
}
