use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use super::{not_found, parse_model_body};
use crate::api_types::{
    ChatMessage, ChatResponse, GenerateResponse, KeepAlive, DEFAULT_KEEP_ALIVE,
};
use crate::state::AppState;

/// `POST /api/generate`. The decoy acknowledges the load (or refresh) the
/// request implies and completes immediately with an empty response body —
/// there is no inference to run.
pub async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("handling POST /api/generate");
    let (value, model) = match parse_model_body(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let keep_alive = requested_keep_alive(&value);

    if !state.registry.load_or_refresh(&model, keep_alive) {
        return not_found(format!("model '{model}' not found"));
    }

    Json(GenerateResponse {
        model,
        created_at: OffsetDateTime::now_utc(),
        response: String::new(),
        done: true,
        done_reason: done_reason(keep_alive).to_owned(),
    })
    .into_response()
}

/// `POST /api/chat`. Same lifecycle semantics as `generate`, answered with
/// an empty assistant message.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("handling POST /api/chat");
    let (value, model) = match parse_model_body(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let keep_alive = requested_keep_alive(&value);

    if !state.registry.load_or_refresh(&model, keep_alive) {
        return not_found(format!("model '{model}' not found"));
    }

    Json(ChatResponse {
        model,
        created_at: OffsetDateTime::now_utc(),
        message: ChatMessage {
            role: String::from("assistant"),
            content: String::new(),
        },
        done: true,
        done_reason: done_reason(keep_alive).to_owned(),
    })
    .into_response()
}

fn requested_keep_alive(value: &Value) -> Duration {
    value
        .get("keep_alive")
        .and_then(|raw| serde_json::from_value::<KeepAlive>(raw.clone()).ok())
        .map(|keep_alive| keep_alive.as_duration())
        .unwrap_or(DEFAULT_KEEP_ALIVE)
}

fn done_reason(keep_alive: Duration) -> &'static str {
    if keep_alive.is_zero() {
        "unload"
    } else {
        "load"
    }
}
