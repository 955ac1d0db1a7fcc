//! Planner server: mission API plus a live event stream for the web UI.

mod routes;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use planner::io::config::{DEFAULT_CONFIG_PATH, load_config};
use planner::io::ideas::IdeaStore;
use planner::io::reasoner::{CommandReasoner, Reasoner, probe_reasoner};
use planner::io::step_executor::SimulatedStepExecutor;
use planner::io::store::FileMissionStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "planner-ui")]
#[command(about = "HTTP API and live event stream for planner missions")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "5000")]
    port: u16,

    /// Planner config file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory containing UI static files (defaults to ./ui/dist)
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("planner_ui=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let cfg = load_config(&args.config)?;
    info!(data_dir = %cfg.data_dir.display(), "starting planner-ui");

    let command_reasoner = CommandReasoner::new(cfg.reasoner.clone())?;
    let reasoner = tokio::task::spawn_blocking(move || probe_reasoner(command_reasoner))
        .await?
        .map(|reasoner| Arc::new(reasoner) as Arc<dyn Reasoner>);
    if reasoner.is_none() {
        warn!("reasoning service unavailable; submitted missions will fail");
    }

    let state = AppState::new(
        reasoner,
        Arc::new(SimulatedStepExecutor::new(cfg.step_delay())),
        Arc::new(FileMissionStore::new(cfg.missions_dir())?),
        IdeaStore::new(cfg.ideas_path()),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    let ui_dir = args.ui_dir.unwrap_or_else(|| PathBuf::from("ui").join("dist"));
    if ui_dir.exists() {
        info!(ui_dir = %ui_dir.display(), "serving static UI files");
        app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
    } else {
        info!(ui_dir = %ui_dir.display(), "UI directory not found, API-only mode");
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
