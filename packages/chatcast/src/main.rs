use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod cli;
mod config;
mod handlers;
mod metrics;
#[cfg(test)]
mod test_helpers;
mod views;
mod ws;

use crate::cli::ServerEndpoint;
use crate::config::{ChatcastConfig, ClientConfig, FileConfig, ServerConfig};
use crate::metrics::ServerMetrics;
use crate::ws::{Broadcaster, ConnectionRegistry};

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "chatcast")]
#[command(about = "Realtime echo and broadcast server over WebSockets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom config directory (defaults to ~/.chatcast)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in the foreground (the default)
    Server(ServerArgs),

    /// Open an interactive session from the terminal
    Connect(ConnectArgs),

    /// Send one message through the request/response endpoint
    Submit(SubmitArgs),
}

#[derive(Parser, Default)]
struct ServerArgs {
    /// Port for the web server (0 = auto-select)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct ConnectArgs {
    /// Server base URL (defaults to the configured host and port)
    #[arg(long)]
    url: Option<String>,

    /// Client id to connect as (default: randomly generated)
    #[arg(long)]
    id: Option<String>,

    /// Exit when the connection drops instead of reconnecting
    #[arg(long)]
    once: bool,
}

#[derive(Parser)]
struct SubmitArgs {
    /// Server base URL (defaults to the configured host and port)
    #[arg(long)]
    url: Option<String>,

    /// Text to send
    text: String,
}

#[derive(Clone)]
pub(crate) struct AppState {
    /// Open realtime sessions
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    /// Server runtime configuration
    pub server_config: Arc<ServerConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    pub fn new(server_config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let metrics = Arc::new(ServerMetrics::new());
        let broadcaster = Broadcaster::new(registry.clone(), Some(metrics.clone()));
        Self {
            registry,
            broadcaster,
            server_config: Arc::new(server_config),
            metrics,
        }
    }
}

/// All routes, without the tracing and CORS layers.
pub(crate) fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(views::index_page))
        .route("/ws/{client_id}", get(handlers::websocket_handler))
        .route("/submit", post(handlers::submit_handler))
        .route("/api/sessions", get(handlers::list_sessions_handler))
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ChatcastConfig::new(cli.config_dir.clone())?;
    let file_config = config.load()?;

    match cli.command {
        None => run_server(ServerArgs::default(), &config, file_config).await,
        Some(Commands::Server(args)) => run_server(args, &config, file_config).await,
        Some(Commands::Connect(args)) => {
            init_client_logging();
            let endpoint = resolve_endpoint(args.url.as_deref(), &file_config)?;
            let client_config = ClientConfig::from_file(&file_config.client);
            let reconnect = (!args.once).then_some(client_config.reconnect_delay);
            cli::connect_command(&endpoint, args.id, reconnect).await
        }
        Some(Commands::Submit(args)) => {
            init_client_logging();
            let endpoint = resolve_endpoint(args.url.as_deref(), &file_config)?;
            cli::submit_command(&endpoint, &args.text).await
        }
    }
}

fn resolve_endpoint(url: Option<&str>, file_config: &FileConfig) -> Result<ServerEndpoint> {
    match url {
        Some(url) => ServerEndpoint::parse(url),
        None => ServerEndpoint::parse(
            &ServerConfig::from_file(&file_config.server).client_base_url(),
        ),
    }
}

/// Client commands print to stdout; keep logs on stderr and quiet by default.
fn init_client_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

async fn run_server(
    args: ServerArgs,
    config: &ChatcastConfig,
    file_config: FileConfig,
) -> Result<()> {
    // Setup logging
    let default_directive = if args.debug {
        "chatcast=debug,tower_http=debug,info"
    } else {
        "chatcast=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting chatcast");
    info!("Config directory: {}", config.config_dir.display());

    let server_config =
        ServerConfig::from_file(&file_config.server).with_overrides(args.host, args.port);
    let addr = server_config.bind_addr()?;
    info!(
        "Server config: send_queue_capacity={}",
        server_config.websocket.send_queue_capacity
    );

    let app_state = AppState::new(server_config);
    let registry_for_shutdown = app_state.registry.clone();
    let metrics_for_shutdown = app_state.metrics.clone();

    let app = app_router(app_state)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("chatcast listening on http://{}", actual_addr);
    info!("");
    info!("Web UI: http://{}/", actual_addr);
    info!("Endpoints:");
    info!("  GET    /ws/:client_id  - WebSocket session (echo + broadcast)");
    info!("  POST   /submit         - Request/response fallback");
    info!("  GET    /api/sessions   - Registered sessions");
    info!("  GET    /health         - Health status");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    // Run server with graceful shutdown
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    let open = registry_for_shutdown.len().await;
    let snapshot = metrics_for_shutdown.snapshot();
    info!(
        "Shutdown complete (open_sessions={}, total_sessions={}, messages={}, dropped={})",
        open,
        snapshot.connections.total,
        snapshot.messages.received,
        snapshot.messages.dropped
    );

    server_result
}
