//! Memoization store for per-model detail documents.
//!
//! Detail documents are JSON blobs on disk, one per mapped model name,
//! parsed on first access and cached by file path. The cache has its own
//! lock, deliberately independent of the registry lock, so detail-file I/O
//! never blocks lifecycle operations. Unbounded by design: the set of
//! reachable files is fixed and small at startup.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Why a detail document could not be produced for a request.
#[derive(Debug, Error)]
pub enum DetailError {
    #[error("detail file '{path}' missing or unreadable: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("detail file '{path}' is invalid JSON: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Default)]
pub struct DetailCache {
    inner: Mutex<HashMap<String, Value>>,
}

impl DetailCache {
    pub fn new() -> Self {
        DetailCache::default()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.lock().get(path).cloned()
    }

    pub fn put(&self, path: impl Into<String>, document: Value) {
        self.lock().insert(path.into(), document);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the parsed document for `path`, reading and caching it on first
/// access. The cache lock is never held across the file read. Two requests
/// racing on the same cold path may both parse the file and both put; the
/// content comes from one immutable file, so last write wins. Failures are
/// never cached — the next request retries.
pub async fn load_detail(cache: &DetailCache, path: &Path) -> Result<Value, DetailError> {
    let key = path.to_string_lossy().into_owned();
    if let Some(document) = cache.get(&key) {
        debug!(path = key.as_str(), "detail cache hit");
        return Ok(document);
    }

    debug!(path = key.as_str(), "detail cache miss, loading from disk");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DetailError::Unreadable {
            path: key.clone(),
            source,
        })?;
    let document: Value =
        serde_json::from_str(&raw).map_err(|source| DetailError::InvalidJson {
            path: key.clone(),
            source,
        })?;

    cache.put(key, document.clone());
    Ok(document)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn get_after_put_returns_the_document_unchanged() {
        let cache = DetailCache::new();
        let document = json!({"details": {"family": "llama"}, "model_info": {"a": 1}});

        cache.put("models/alpha.json", document.clone());
        assert_eq!(cache.get("models/alpha.json"), Some(document));
    }

    #[test]
    fn unknown_path_is_absent() {
        let cache = DetailCache::new();
        assert_eq!(cache.get("models/never-seen.json"), None);
    }

    #[test]
    fn put_overwrites_last_write_wins() {
        let cache = DetailCache::new();
        cache.put("models/alpha.json", json!({"rev": 1}));
        cache.put("models/alpha.json", json!({"rev": 2}));

        assert_eq!(cache.get("models/alpha.json"), Some(json!({"rev": 2})));
    }

    #[tokio::test]
    async fn load_detail_populates_the_cache_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.json");
        std::fs::write(&path, r#"{"modelfile": "FROM alpha"}"#).unwrap();

        let cache = DetailCache::new();
        let document = load_detail(&cache, &path).await.unwrap();
        assert_eq!(document, json!({"modelfile": "FROM alpha"}));
        assert_eq!(cache.get(&path.to_string_lossy()), Some(document));
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let cache = DetailCache::new();
        let err = load_detail(&cache, &path).await.unwrap_err();
        assert!(matches!(err, DetailError::Unreadable { .. }));
        assert_eq!(cache.get(&path.to_string_lossy()), None);
    }

    #[tokio::test]
    async fn invalid_json_is_an_error_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        let cache = DetailCache::new();
        let err = load_detail(&cache, &path).await.unwrap_err();
        assert!(matches!(err, DetailError::InvalidJson { .. }));
        assert_eq!(cache.get(&path.to_string_lossy()), None);
    }
}
