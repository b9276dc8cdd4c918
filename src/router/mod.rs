use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::api_types::error_body;
use crate::state::AppState;

pub mod generate;
pub mod misc;
pub mod models;

/// Main router for the application, with every decoy endpoint attached.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(misc::root))
        .route("/api/version", get(misc::version))
        //
        // Catalog and loaded-model listings
        //
        .route("/api/tags", get(models::tags))
        .route("/api/ps", get(models::ps))
        //
        // Per-model detail and lifecycle
        //
        .route("/api/show", post(models::show))
        .route("/api/delete", delete(models::delete_model))
        .route("/api/generate", post(generate::generate))
        .route("/api/chat", post(generate::chat))
        .layer(TraceLayer::new_for_http())
}

/// Parses a request body that must be a JSON object carrying a string
/// `model` field. Bodies are parsed by hand rather than through the `Json`
/// extractor so that malformed input produces the imitated API's error
/// envelopes instead of a framework rejection.
pub(crate) fn parse_model_body(body: &Bytes) -> Result<(Value, String), Response> {
    if body.is_empty() {
        return Err(bad_request("missing request body"));
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|_| bad_request("invalid json request format"))?;
    let model = match value.get("model").and_then(Value::as_str) {
        Some(model) if !model.is_empty() => model.to_owned(),
        _ => return Err(bad_request("missing 'model' field in request body")),
    };
    Ok((value, model))
}

pub(crate) fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(error_body(message))).into_response()
}

pub(crate) fn not_found(message: String) -> Response {
    (StatusCode::NOT_FOUND, Json(error_body(message))).into_response()
}

pub(crate) fn internal_error(message: String) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error_body(message))).into_response()
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::app_router;
    use crate::config::{ApiConfig, CatalogEntry, DecoyConfig};
    use crate::state::AppState;

    fn catalog_entry(name: &str, size: u64) -> CatalogEntry {
        CatalogEntry {
            name: name.to_owned(),
            model: name.to_owned(),
            size,
            ..CatalogEntry::default()
        }
    }

    fn state_with(
        catalog: Vec<CatalogEntry>,
        detail_files: HashMap<String, String>,
        detail_root: PathBuf,
    ) -> AppState {
        let config = DecoyConfig {
            api: ApiConfig {
                version: String::from("0.6.0"),
                catalog,
                detail_files,
            },
            ..DecoyConfig::default()
        };
        AppState::new(&config, detail_root, None)
    }

    fn default_state() -> AppState {
        state_with(
            vec![catalog_entry("alpha:latest", 100)],
            HashMap::new(),
            PathBuf::new(),
        )
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_reports_the_liveness_banner() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&bytes[..], b"Ollama is running");
    }

    #[tokio::test]
    async fn version_reports_the_configured_version() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/version")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"version": "0.6.0"}));
    }

    #[tokio::test]
    async fn tags_lists_the_catalog() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/tags")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["models"][0]["name"], "alpha:latest");
        assert_eq!(body["models"][0]["size"], 100);
    }

    #[tokio::test]
    async fn empty_body_yields_the_missing_body_envelope() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "missing request body"}));
    }

    #[tokio::test]
    async fn malformed_body_yields_the_invalid_json_envelope() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::from("{ nope"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "invalid json request format"})
        );
    }

    #[tokio::test]
    async fn missing_model_field_yields_its_envelope() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::from(r#"{"verbose": true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "missing 'model' field in request body"})
        );
    }

    #[tokio::test]
    async fn show_unknown_model_is_not_found() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::from(r#"{"model": "ghost:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "model 'ghost:latest' not found"})
        );
    }

    #[tokio::test]
    async fn show_serves_and_caches_the_detail_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("alpha.json"),
            r#"{
                "modelfile": "FROM alpha",
                "model_info": {
                    "general.architecture": "llama",
                    "tokenizer.ggml.tokens": ["a", "b"],
                    "tokenizer.ggml.merges": ["a b"],
                    "tokenizer.ggml.token_type": [1, 1]
                }
            }"#,
        )
        .unwrap();
        let mut detail_files = HashMap::new();
        detail_files.insert(String::from("alpha:latest"), String::from("alpha.json"));
        let state = state_with(
            vec![catalog_entry("alpha:latest", 100)],
            detail_files,
            dir.path().to_path_buf(),
        );
        let app = app_router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::from(r#"{"model": "alpha:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["modelfile"], "FROM alpha");
        assert_eq!(body["model_info"]["general.architecture"], "llama");
        assert_eq!(body["model_info"]["tokenizer.ggml.tokens"], Value::Null);
        assert_eq!(body["model_info"]["tokenizer.ggml.merges"], Value::Null);

        // The cached document keeps the full tokenizer fields; verbose
        // requests see them.
        let cache_key = dir.path().join("alpha.json");
        let cached = state.details.get(&cache_key.to_string_lossy()).unwrap();
        assert_eq!(cached["model_info"]["tokenizer.ggml.tokens"], json!(["a", "b"]));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::from(r#"{"model": "alpha:latest", "verbose": true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["model_info"]["tokenizer.ggml.tokens"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn show_reports_unreadable_and_invalid_detail_files_distinctly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let mut detail_files = HashMap::new();
        detail_files.insert(String::from("alpha:latest"), String::from("gone.json"));
        detail_files.insert(String::from("beta:latest"), String::from("broken.json"));
        let state = state_with(Vec::new(), detail_files, dir.path().to_path_buf());
        let app = app_router().with_state(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::from(r#"{"model": "alpha:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "internal error: detail file for model 'alpha:latest' missing or unreadable"})
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/show")
                    .body(Body::from(r#"{"model": "beta:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "internal error: detail file for model 'beta:latest' is invalid JSON"})
        );
    }

    #[tokio::test]
    async fn delete_succeeds_once_then_reports_not_found() {
        let app = app_router().with_state(default_state());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/delete")
                    .body(Body::from(r#"{"model": "alpha:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/delete")
                    .body(Body::from(r#"{"model": "alpha:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "model 'alpha:latest' not found"})
        );
    }

    #[tokio::test]
    async fn generate_loads_the_model_and_ps_reports_it() {
        let state = default_state();
        let app = app_router().with_state(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate")
                    .body(Body::from(r#"{"model": "alpha:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["model"], "alpha:latest");
        assert_eq!(body["done"], true);
        assert_eq!(body["done_reason"], "load");
        assert_eq!(body["response"], "");

        assert_eq!(state.registry.list_loaded().len(), 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/ps")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["models"][0]["name"], "alpha:latest");
        assert_eq!(body["models"][0]["size_vram"], 100);
    }

    #[tokio::test]
    async fn generate_unknown_model_is_not_found() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate")
                    .body(Body::from(r#"{"model": "ghost:latest"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "model 'ghost:latest' not found"})
        );
    }

    #[tokio::test]
    async fn zero_keep_alive_unloads() {
        let state = default_state();
        let app = app_router().with_state(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate")
                    .body(Body::from(r#"{"model": "alpha:latest", "keep_alive": 0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["done_reason"], "unload");

        assert!(state.registry.list_loaded().is_empty());
    }

    #[tokio::test]
    async fn chat_answers_with_an_assistant_message() {
        let app = app_router().with_state(default_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .body(Body::from(
                        r#"{"model": "alpha:latest", "messages": [], "keep_alive": "5m"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["model"], "alpha:latest");
        assert_eq!(body["message"]["role"], "assistant");
        assert_eq!(body["done"], true);
    }
}
