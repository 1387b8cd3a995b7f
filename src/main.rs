mod clipboard;
mod config;
mod error;
mod export;
mod handlers;
mod language;
mod protocol;
mod routes;
mod scheduler;
mod state;
mod translate;
mod websocket;
mod widget;

use anyhow::Result;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("translation_widget=debug,tower_http=debug")),
        )
        .init();

    let config = load_config()?;

    std::fs::create_dir_all(config.system_config.downloads_path())?;
    info!("Downloads directory: {}", config.system_config.downloads_dir);

    let app_state = AppState::new(config.clone())?;

    let app = Router::new()
        .merge(routes::create_routes(app_state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state);

    let listener = bind(&config.system_config.host, config.system_config.port).await?;
    info!("Starting server on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Bind to `host`, which may be an IP address or a hostname such as
/// `localhost`.
async fn bind(host: &str, port: u16) -> Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    Ok(listener)
}

/// Try `CONFIG_PATH`, then the working directory, then next to the
/// executable. Without any file the built-in defaults are used.
fn load_config() -> Result<Config> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));

    let mut candidates: Vec<String> = Vec::new();
    if let Ok(path) = std::env::var("CONFIG_PATH") {
        // An explicit path must load.
        let config = Config::load(&path)?;
        info!("Loaded configuration from: {}", path);
        return Ok(config);
    }
    candidates.push("conf.yaml".to_string());
    candidates.push("conf.json".to_string());
    if let Some(dir) = exe_dir {
        for name in ["conf.yaml", "conf.json"] {
            if let Some(path) = dir.join(name).to_str() {
                candidates.push(path.to_string());
            }
        }
    }

    for path in &candidates {
        match Config::load(path) {
            Ok(config) => {
                info!("Loaded configuration from: {}", path);
                return Ok(config);
            }
            Err(e) => debug!("Failed to load config from {}: {}", path, e),
        }
    }

    info!("No config file found (tried {:?}); using defaults", candidates);
    Ok(Config::default())
}
