//! Types needed by the decoy API surface.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::config::{CatalogEntry, ModelDetails};
use crate::state::registry::LoadedModel;

/// Keep-alive applied when a load request does not specify one.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5 * 60);

/// Stand-in for "keep this model resident forever". A negative keep-alive
/// pins the model; a hundred years outlives any probe session without
/// overflowing instant arithmetic.
const FOREVER_KEEP_ALIVE_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// The `keep_alive` field as clients send it: a JSON number of seconds or a
/// Go-style duration string ("30s", "5m", "1h"). Zero expires immediately
/// (the simulated unload), negative pins the model.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum KeepAlive {
    Seconds(i64),
    Text(String),
}

impl KeepAlive {
    pub fn as_duration(&self) -> Duration {
        match self {
            KeepAlive::Seconds(secs) => seconds_to_duration(*secs),
            KeepAlive::Text(text) => parse_duration_text(text).unwrap_or(DEFAULT_KEEP_ALIVE),
        }
    }
}

fn seconds_to_duration(secs: i64) -> Duration {
    if secs < 0 {
        Duration::from_secs(FOREVER_KEEP_ALIVE_SECS)
    } else {
        Duration::from_secs(secs as u64)
    }
}

fn parse_duration_text(text: &str) -> Option<Duration> {
    let text = text.trim();
    if let Some(millis) = text.strip_suffix("ms") {
        let value: i64 = millis.parse().ok()?;
        return Some(if value < 0 {
            Duration::from_secs(FOREVER_KEEP_ALIVE_SECS)
        } else {
            Duration::from_millis(value as u64)
        });
    }

    let (digits, multiplier) = if let Some(rest) = text.strip_suffix('s') {
        (rest, 1)
    } else if let Some(rest) = text.strip_suffix('m') {
        (rest, 60)
    } else if let Some(rest) = text.strip_suffix('h') {
        (rest, 3600)
    } else {
        (text, 1)
    };
    let value: i64 = digits.parse().ok()?;
    Some(seconds_to_duration(value.checked_mul(multiplier)?))
}

#[derive(Serialize, Debug, Clone)]
pub struct VersionResponse {
    pub version: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct TagsResponse {
    pub models: Vec<CatalogEntry>,
}

#[derive(Serialize, Debug, Clone)]
pub struct PsResponse {
    pub models: Vec<PsModel>,
}

/// One entry of the loaded-model listing. Expiry is tracked on a monotonic
/// clock internally; for the wire the remaining keep-alive is re-anchored
/// to UTC at response time.
#[derive(Serialize, Debug, Clone)]
pub struct PsModel {
    pub name: String,
    pub model: String,
    pub size: u64,
    pub digest: String,
    pub details: ModelDetails,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub size_vram: u64,
}

impl PsModel {
    pub fn from_loaded(loaded: &LoadedModel, now: Instant) -> Self {
        let remaining = loaded.expires_at.saturating_duration_since(now);
        PsModel {
            name: loaded.entry.name.clone(),
            model: loaded.entry.model.clone(),
            size: loaded.entry.size,
            digest: loaded.entry.digest.clone(),
            details: loaded.entry.details.clone(),
            expires_at: OffsetDateTime::now_utc() + remaining,
            size_vram: loaded.size_vram,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct GenerateResponse {
    pub model: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub response: String,
    pub done: bool,
    pub done_reason: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChatResponse {
    pub model: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub message: ChatMessage,
    pub done: bool,
    pub done_reason: String,
}

/// The imitated API's error envelope.
pub fn error_body(message: impl Into<String>) -> Value {
    serde_json::json!({ "error": message.into() })
}
