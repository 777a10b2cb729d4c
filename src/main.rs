mod models;
mod handlers;
mod routes;
mod docs;
mod websocket;
mod config;
mod clients;
mod ws;

use clients::execution_client::ExecutionClient;
use config::Config;
use routes::create_app;
use std::panic;
use std::sync::Arc;
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use ws::relay::Relay;

/// Shared state handed to every handler
pub struct AppState {
    pub relay: Arc<Relay>,
    pub executor: ExecutionClient,
    pub config: Config,
}

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to info level, but allow debug for our app
            "coderoom_relay=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    if config.jdoodle_client_id.is_none() || config.jdoodle_client_secret.is_none() {
        if config.is_development() {
            warn!("Execution provider credentials not set, /compile calls will fail upstream");
        } else {
            error!("Execution provider credentials not set in {} environment", config.environment);
        }
    }

    // Client for the execution provider
    let executor = ExecutionClient::new(
        config.jdoodle_url.clone(),
        config.jdoodle_client_id.clone(),
        config.jdoodle_client_secret.clone(),
        config.compile_timeout(),
    )
    .expect("Failed to build execution provider client");

    let address = config.server_address();
    let state = Arc::new(AppState {
        relay: Arc::new(Relay::new()),
        executor,
        config,
    });

    // Combine all routes
    let app_routes = create_app(state.clone());

    // Start the HTTP/WebSocket server
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", address));

    info!("🚀 {} running on http://{}", state.config.service_name, address);
    info!("📡 WebSocket available at ws://{}/ws", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
