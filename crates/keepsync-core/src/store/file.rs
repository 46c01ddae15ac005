// ── JSON file store ──
//
// One JSON document per file. Saves go through a sibling temp file and a
// rename so a concurrent reader sees either the old or the new document.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::ValueStore;
use crate::error::StoreError;

/// A [`ValueStore`] that keeps the value as JSON in a single file.
///
/// A missing file loads as `None`. Parent directories are created on the
/// first save.
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    pretty: bool,
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
            _value: PhantomData,
        }
    }

    /// Write compact single-line JSON instead of pretty-printed output.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T> ValueStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<T>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                trace!(path = %self.path.display(), bytes = bytes.len(), "read value file");
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, value: &T) -> Result<(), StoreError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        trace!(path = %self.path.display(), bytes = bytes.len(), "wrote value file");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[tokio::test]
    async fn missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<u32> = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_in_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("prefs.json");
        let store = JsonFileStore::new(&path);

        let mut prefs = BTreeMap::new();
        prefs.insert("theme".to_string(), "dark".to_string());
        store.save(&prefs).await.unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().await.unwrap(), Some(prefs));
    }

    #[tokio::test]
    async fn compact_writes_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        let store = JsonFileStore::new(&path).compact();
        store.save(&vec![1, 2, 3]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1,2,3]");
    }

    #[tokio::test]
    async fn corrupt_file_is_a_codec_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let store: JsonFileStore<u32> = JsonFileStore::new(&path);
        assert!(matches!(store.load().await, Err(StoreError::Codec(_))));
    }
}
