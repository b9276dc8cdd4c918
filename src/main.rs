use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use axum::middleware;
use tracing::{info, warn};

use decoy_server::{
    config, logging,
    reqlog::{self, RequestLog},
    router,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("config/decoy.json"));

    let config = config::load_config(&config_path)
        .with_context(|| format!("failed to load configuration '{config_path}'"))?;

    logging::init_logging(&config.logging).context("failed to initialize logging")?;
    info!(path = config_path.as_str(), "configuration loaded");

    let request_log = if config.logging.request_log_path.is_empty() {
        warn!("'logging.request_log_path' is empty, request logging disabled");
        None
    } else {
        let log = RequestLog::open(&config.logging.request_log_path).with_context(|| {
            format!(
                "failed to open request log '{}'",
                config.logging.request_log_path
            )
        })?;
        info!(
            path = config.logging.request_log_path.as_str(),
            "request logging initialized"
        );
        Some(log)
    };

    // Detail files resolve relative to wherever the config itself lives.
    let detail_root = Path::new(&config_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let state = AppState::new(&config, detail_root, request_log);

    let app = router::app_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            reqlog::log_requests,
        ))
        .with_state(state);

    let listen_addr: SocketAddr = format!(
        "{}:{}",
        config.server.listen_address, config.server.listen_port
    )
    .parse()
    .context("invalid bind addr")?;
    warn!(addr = %listen_addr, "starting decoy server");

    axum::Server::bind(&listen_addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("failed to start axum server")?;

    Ok(())
}
