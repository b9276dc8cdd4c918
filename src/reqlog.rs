//! Structured request logging.
//!
//! Every inbound request is appended to a JSONL file as one line: who asked,
//! what they asked, and what status they got back. This is the whole point
//! of a decoy, so the record is deliberately verbose — full headers and the
//! request body (truncated) — but strictly best-effort: a failed write is
//! reported to the operational log and the request proceeds untouched.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::error;

use crate::state::AppState;

/// Longest request-body prefix written to the request log.
const MAX_LOGGED_BODY: usize = 4096;

#[derive(Serialize)]
struct RequestEntry {
    timestamp: String,
    source_ip: String,
    method: String,
    url: String,
    headers: serde_json::Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    body: String,
    body_truncated: bool,
    response_status: u16,
}

/// Handle to the request log file. Constructed once at startup and passed
/// explicitly into the middleware via [`AppState`]; cloning shares the
/// underlying file.
#[derive(Clone)]
pub struct RequestLog {
    file: Arc<Mutex<File>>,
}

impl RequestLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(RequestLog {
            file: Arc::new(Mutex::new(file)),
        })
    }

    fn record(&self, entry: &RequestEntry) {
        let mut line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, "failed to serialize request log entry");
                return;
            }
        };
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = file.write_all(line.as_bytes()) {
            error!(error = %err, "failed to write request log entry");
        }
    }
}

/// Middleware recording one JSONL entry per request. The body is buffered
/// up front so the logged copy and the handler both see it.
pub async fn log_requests(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let Some(log) = state.request_log.clone() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match hyper::body::to_bytes(body).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(error = %err, "failed to buffer request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let method = parts.method.to_string();
    let url = parts.uri.to_string();
    let headers = parts.headers.clone();

    let request = Request::from_parts(parts, Body::from(bytes.clone()));
    let response = next.run(request).await;

    let body_truncated = bytes.len() > MAX_LOGGED_BODY;
    let logged_body = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];

    let entry = RequestEntry {
        timestamp: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        source_ip: addr.ip().to_string(),
        method,
        url,
        headers: headers_to_json(&headers),
        user_agent: header_value(&headers, header::USER_AGENT),
        body: String::from_utf8_lossy(logged_body).into_owned(),
        body_truncated,
        response_status: response.status().as_u16(),
    };
    log.record(&entry);

    response
}

fn headers_to_json(headers: &HeaderMap) -> serde_json::Map<String, Value> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect()
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}
