use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DecoyConfig;
use crate::reqlog::RequestLog;

pub mod details;
pub mod registry;

use details::DetailCache;
use registry::ModelRegistry;

type RegistryHandle = Arc<ModelRegistry>;
type DetailCacheHandle = Arc<DetailCache>;

/// Process-wide state, constructed once from a validated configuration and
/// cloned cheaply into every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
    pub details: DetailCacheHandle,
    pub version: Arc<String>,
    /// Directory the configuration was loaded from; detail-file paths
    /// resolve relative to it.
    pub detail_root: Arc<PathBuf>,
    pub request_log: Option<RequestLog>,
}

impl AppState {
    pub fn new(
        config: &DecoyConfig,
        detail_root: PathBuf,
        request_log: Option<RequestLog>,
    ) -> Self {
        AppState {
            registry: Arc::new(ModelRegistry::new(
                config.api.catalog.clone(),
                config.api.detail_files.clone(),
            )),
            details: Arc::new(DetailCache::new()),
            version: Arc::new(config.api.version.clone()),
            detail_root: Arc::new(detail_root),
            request_log,
        }
    }
}
