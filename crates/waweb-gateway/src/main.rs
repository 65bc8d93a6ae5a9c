use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use waweb_core::config::WawebConfig;
use waweb_gateway::{app, logging};

#[derive(Parser)]
#[command(name = "waweb-gateway", version, about = "WhatsApp AI coding assistant")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, env = "WAWEB_CONFIG")]
    config: Option<String>,

    /// Port to listen on; overrides config and PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // config: --config > WAWEB_CONFIG > ./waweb.toml, then env overrides
    let (mut config, load_error) = match WawebConfig::load(args.config.as_deref()) {
        Ok(c) => (c, None),
        Err(e) => (WawebConfig::default(), Some(e)),
    };
    let _log_guard = logging::init(&config.logging);
    if let Some(e) = load_error {
        warn!("Config load failed ({}), using defaults", e);
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;

    let state = Arc::new(app::AppState::from_config(config)?);
    let _sweeper = app::spawn_session_sweeper(Arc::clone(&state));
    let router = app::build_router(state);

    info!("waweb gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
