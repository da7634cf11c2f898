//! # Tollgate - Time-Lock Admission Engine
//!
//! A CAPTCHA alternative: a client pays for admission with a fixed amount
//! of unparallelizable CPU time instead of solving a visual puzzle. The
//! server holds the factorization of the per-site modulus and checks a
//! solution almost instantly.
//!
//! ## Flow
//! ```text
//! Client → /captcha/problem/get → t sequential squarings → /captcha/verify
//!                    ↓                                           ↓
//!                 Tollgate  ←———————  Store (memory | file | redis)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod puzzle;
mod replay;
mod routes;
mod sites;
mod state;
mod store;

use config::AppConfig;
use state::AppState;

/// Tollgate - time-lock puzzle admission engine
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/tollgate.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Storage backend: memory, file, or redis (overrides config)
    #[arg(long, env = "STORAGE")]
    storage: Option<String>,

    /// File storage root (overrides config)
    #[arg(long, env = "STORAGE_PATH")]
    storage_path: Option<String>,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Environment file first, then CLI arguments
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("🚧 Starting Tollgate v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, &args)?;
    info!(storage = %config.storage, "📋 Configuration loaded");

    let state = AppState::new(config.clone()).await?;
    info!("✅ Storage backend ready: {}", config.storage);

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("🚀 Tollgate listening on {}", config.listen_addr);

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("🛑 Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("👋 Tollgate shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
