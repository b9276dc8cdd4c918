//! The in-memory model lifecycle engine.
//!
//! Simulates the catalog and the set of "loaded" models a real serving
//! daemon would report. Loaded entries carry a keep-alive expiry on a
//! monotonic clock; expiry is lazy — nothing sweeps the loaded set in the
//! background, expired entries are simply filtered out of listings until a
//! delete or reload replaces them.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::CatalogEntry;

/// A catalog entry simulated as resident in memory.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub entry: CatalogEntry,
    pub expires_at: Instant,
    pub size_vram: u64,
}

struct RegistryInner {
    catalog: Vec<CatalogEntry>,
    loaded: Vec<LoadedModel>,
    detail_paths: HashMap<String, String>,
}

/// Thread-safe registry of advertised, loaded, and detail-mapped models.
///
/// One reader/writer lock guards all three collections together; `delete`
/// mutates them as a unit. The lock is only ever held for in-memory work,
/// never across I/O.
pub struct ModelRegistry {
    inner: RwLock<RegistryInner>,
}

impl ModelRegistry {
    pub fn new(catalog: Vec<CatalogEntry>, detail_paths: HashMap<String, String>) -> Self {
        debug!(
            models = catalog.len(),
            detail_files = detail_paths.len(),
            "model registry initialized"
        );
        ModelRegistry {
            inner: RwLock::new(RegistryInner {
                catalog,
                loaded: Vec::new(),
                detail_paths,
            }),
        }
    }

    /// Snapshot of the advertised catalog, in configuration order.
    pub fn list_catalog(&self) -> Vec<CatalogEntry> {
        self.read().catalog.clone()
    }

    pub fn list_loaded(&self) -> Vec<LoadedModel> {
        self.list_loaded_at(Instant::now())
    }

    /// Snapshot of loaded models whose expiry is strictly after `now`.
    /// Expired entries stay in storage until deleted or reloaded; they are
    /// only excluded from the listing.
    pub fn list_loaded_at(&self, now: Instant) -> Vec<LoadedModel> {
        self.read()
            .loaded
            .iter()
            .filter(|loaded| loaded.expires_at > now)
            .cloned()
            .collect()
    }

    /// Relative path of the detail document configured for `model_name`.
    /// Exact-match lookup; `None` is the ordinary not-found result.
    pub fn resolve_detail_path(&self, model_name: &str) -> Option<String> {
        self.read().detail_paths.get(model_name).cloned()
    }

    /// Removes `model_name` from the catalog, the loaded set, and the
    /// detail-path map. A model may exist in any subset of the three.
    /// Returns whether anything was removed; a repeated call is a no-op
    /// returning false.
    pub fn delete(&self, model_name: &str) -> bool {
        let mut inner = self.write();

        let catalog_len = inner.catalog.len();
        inner.catalog.retain(|entry| entry.name != model_name);
        let removed_entry = inner.catalog.len() != catalog_len;

        let loaded_len = inner.loaded.len();
        inner.loaded.retain(|loaded| loaded.entry.name != model_name);
        let removed_loaded = inner.loaded.len() != loaded_len;

        let removed_mapping = inner.detail_paths.remove(model_name).is_some();

        let removed = removed_entry || removed_loaded || removed_mapping;
        if removed {
            info!(model = model_name, "simulated delete");
        }
        removed
    }

    pub fn load_or_refresh(&self, model_name: &str, keep_alive: Duration) -> bool {
        self.load_or_refresh_at(model_name, keep_alive, Instant::now())
    }

    /// Marks `model_name` as loaded until `now + keep_alive`.
    ///
    /// A name not present in the catalog fails without mutating anything.
    /// A name already loaded has only its expiry refreshed in place — no
    /// duplicate entry, and size/metadata are untouched on refresh.
    pub fn load_or_refresh_at(
        &self,
        model_name: &str,
        keep_alive: Duration,
        now: Instant,
    ) -> bool {
        let mut inner = self.write();

        let Some(entry) = inner
            .catalog
            .iter()
            .find(|entry| entry.name == model_name)
            .cloned()
        else {
            warn!(model = model_name, "attempted to load unknown model");
            return false;
        };

        let expires_at = now + keep_alive;
        if let Some(loaded) = inner
            .loaded
            .iter_mut()
            .find(|loaded| loaded.entry.name == model_name)
        {
            loaded.expires_at = expires_at;
            debug!(model = model_name, "refreshed keep-alive for loaded model");
        } else {
            let size_vram = entry.size;
            inner.loaded.push(LoadedModel {
                entry,
                expires_at,
                size_vram,
            });
            info!(
                model = model_name,
                keep_alive_secs = keep_alive.as_secs(),
                "simulated load"
            );
        }
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
