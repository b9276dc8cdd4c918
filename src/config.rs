//! Typed configuration for the decoy server.
//!
//! One JSON document describes the bind address, the logging sinks, and the
//! fake API behavior (advertised version, model catalog, and the map from
//! model names to on-disk detail documents). [`load_config`] parses and
//! validates the whole document before any server state is constructed;
//! a defective config is fatal to startup.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder name a catalog entry carries when the config omits one. Also
/// the sentinel that [`backfill_aliases`] treats as "no alias configured".
pub const DEFAULT_MODEL_NAME: &str = "default:latest";

/// Descriptive metadata advertised for a catalog entry. Every field has a
/// plausible default so a sparse config still serializes into a complete
/// wire object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelDetails {
    #[serde(default)]
    pub parent_model: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default)]
    pub families: Option<Vec<String>>,
    #[serde(default = "default_parameter_size")]
    pub parameter_size: String,
    #[serde(default = "default_quantization_level")]
    pub quantization_level: String,
}

impl Default for ModelDetails {
    fn default() -> Self {
        ModelDetails {
            parent_model: None,
            format: default_format(),
            family: default_family(),
            families: None,
            parameter_size: default_parameter_size(),
            quantization_level: default_quantization_level(),
        }
    }
}

/// One advertised model. `name` is the identity every lifecycle operation
/// keys on; `model` is the alias field the imitated API exposes alongside it
/// and is backfilled from `name` after parsing when left empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_modified_at")]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default = "default_digest")]
    pub digest: String,
    #[serde(default)]
    pub details: ModelDetails,
}

impl Default for CatalogEntry {
    fn default() -> Self {
        CatalogEntry {
            name: default_model_name(),
            model: String::new(),
            modified_at: default_modified_at(),
            size: 0,
            digest: default_digest(),
            details: ModelDetails::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_outputs")]
    pub log_outputs: Vec<String>,
    #[serde(default = "default_log_file_path")]
    pub log_file_path: String,
    #[serde(default = "default_request_log_path")]
    pub request_log_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: default_log_level(),
            log_outputs: default_log_outputs(),
            log_file_path: default_log_file_path(),
            request_log_path: default_request_log_path(),
        }
    }
}

/// The fake API behavior: advertised version string, the model catalog, and
/// the name→detail-file map backing `/api/show`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
    #[serde(default)]
    pub detail_files: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            version: default_version(),
            catalog: Vec::new(),
            detail_files: HashMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DecoyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open configuration file '{}': {}", .path.display(), .source)]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration file '{}': {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'server.listen_port' cannot be 0")]
    ZeroPort,

    #[error("duplicate catalog entry for model '{name}'")]
    DuplicateModel { name: String },

    #[error(
        "detail files listed in 'api.detail_files' not found relative to '{}': {}",
        .dir.display(),
        .missing.join(", ")
    )]
    MissingDetailFiles { dir: PathBuf, missing: Vec<String> },
}

/// Reads, parses, and validates the configuration document at `path`.
///
/// Validation is all-or-nothing: a zero bind port, a duplicated catalog
/// name, or any missing detail file rejects the whole load. Missing detail
/// files are reported together, every absent path in one error, so a broken
/// deployment is fixed in one pass. Paths in `api.detail_files` resolve
/// relative to the directory `path` itself lives in.
pub fn load_config(path: impl AsRef<Path>) -> Result<DecoyConfig, ConfigError> {
    let path = path.as_ref();

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: DecoyConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if config.server.listen_port == 0 {
        return Err(ConfigError::ZeroPort);
    }

    let mut seen = HashSet::new();
    for entry in &config.api.catalog {
        if !seen.insert(entry.name.clone()) {
            return Err(ConfigError::DuplicateModel {
                name: entry.name.clone(),
            });
        }
    }

    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut missing: Vec<String> = config
        .api
        .detail_files
        .values()
        .filter(|relative| !dir.join(relative.as_str()).exists())
        .cloned()
        .collect();
    missing.sort();
    if !missing.is_empty() {
        return Err(ConfigError::MissingDetailFiles { dir, missing });
    }

    backfill_aliases(&mut config.api.catalog);

    Ok(config)
}

/// Backfills the `model` alias from `name` wherever a catalog entry carries
/// an empty alias or the placeholder default. A one-time pass over the
/// parsed catalog, not a deserialization rule.
pub fn backfill_aliases(catalog: &mut [CatalogEntry]) {
    for entry in catalog {
        if entry.model.is_empty() || entry.model == DEFAULT_MODEL_NAME {
            entry.model = entry.name.clone();
        }
    }
}

fn default_model_name() -> String {
    String::from(DEFAULT_MODEL_NAME)
}

fn default_modified_at() -> String {
    String::from("1970-01-01T00:00:00.000000Z")
}

fn default_digest() -> String {
    String::from("sha256:0000000000000000000000000000000000000000000000000000000000000000")
}

fn default_format() -> String {
    String::from("gguf")
}

fn default_family() -> String {
    String::from("unknown")
}

fn default_parameter_size() -> String {
    String::from("N/A")
}

fn default_quantization_level() -> String {
    String::from("unknown")
}

fn default_listen_address() -> String {
    String::from("0.0.0.0")
}

fn default_listen_port() -> u16 {
    11434
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_outputs() -> Vec<String> {
    vec![String::from("stdout")]
}

fn default_log_file_path() -> String {
    String::from("decoy_operational.log")
}

fn default_request_log_path() -> String {
    String::from("decoy_requests.jsonl")
}

fn default_version() -> String {
    String::from("0.6.0")
}
