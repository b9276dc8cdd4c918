use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{internal_error, not_found, parse_model_body};
use crate::api_types::{PsModel, PsResponse, TagsResponse};
use crate::state::details::{load_detail, DetailError};
use crate::state::AppState;

pub async fn tags(State(state): State<AppState>) -> Json<TagsResponse> {
    debug!("handling GET /api/tags");
    Json(TagsResponse {
        models: state.registry.list_catalog(),
    })
}

pub async fn ps(State(state): State<AppState>) -> Json<PsResponse> {
    debug!("handling GET /api/ps");
    let now = Instant::now();
    let models = state
        .registry
        .list_loaded_at(now)
        .iter()
        .map(|loaded| PsModel::from_loaded(loaded, now))
        .collect();
    Json(PsResponse { models })
}

pub async fn show(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("handling POST /api/show");
    let (value, model) = match parse_model_body(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let verbose = value.get("verbose").and_then(Value::as_bool).unwrap_or(false);

    let Some(relative_path) = state.registry.resolve_detail_path(&model) else {
        info!(model = model.as_str(), "model not found for /api/show");
        return not_found(format!("model '{model}' not found"));
    };

    let full_path = state.detail_root.join(&relative_path);
    let mut document = match load_detail(&state.details, &full_path).await {
        Ok(document) => document,
        Err(err @ DetailError::Unreadable { .. }) => {
            error!(model = model.as_str(), error = %err, "failed to read detail file");
            return internal_error(format!(
                "internal error: detail file for model '{model}' missing or unreadable"
            ));
        }
        Err(err @ DetailError::InvalidJson { .. }) => {
            error!(model = model.as_str(), error = %err, "failed to parse detail file");
            return internal_error(format!(
                "internal error: detail file for model '{model}' is invalid JSON"
            ));
        }
    };

    if !verbose {
        strip_verbose_fields(&mut document, &model);
    }

    Json(document).into_response()
}

/// Nulls the bulky tokenizer fields the imitated API withholds unless the
/// caller asks for a verbose listing. Operates on this request's copy of
/// the document; the cached original is untouched.
fn strip_verbose_fields(document: &mut Value, model: &str) {
    match document.get_mut("model_info") {
        Some(Value::Object(model_info)) => {
            for field in [
                "tokenizer.ggml.merges",
                "tokenizer.ggml.token_type",
                "tokenizer.ggml.tokens",
            ] {
                model_info.insert(field.to_owned(), Value::Null);
            }
        }
        _ => warn!(
            model = model,
            "detail document unexpectedly missing 'model_info' object"
        ),
    }
}

pub async fn delete_model(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("handling DELETE /api/delete");
    let (_, model) = match parse_model_body(&body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    info!(model = model.as_str(), "attempting to delete model");
    if state.registry.delete(&model) {
        StatusCode::OK.into_response()
    } else {
        info!(model = model.as_str(), "model not found for deletion");
        not_found(format!("model '{model}' not found"))
    }
}
