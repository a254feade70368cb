//! Settlement action HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p karaoke-settle-action --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p karaoke-settle-action
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p karaoke-settle-action
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `config.toml`)
//! - `HOST` - Override bind address (default: `0.0.0.0`)
//! - `PORT` - Override port (default: `4030`)
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use tower_http::cors;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use karaoke_settle_action::action_router;
use karaoke_settle_action::backend::settlement_signer;
use karaoke_settle_action::config::ActionConfig;
use karaoke_settle_action::error::ActionError;
use karaoke_settle_action::util::SigDown;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Settlement action failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ActionError> {
    let config = ActionConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        signing_timeout_secs = config.signing_timeout_secs,
        sig_name = %config.sig_name,
        "Loaded configuration"
    );

    let signer = Arc::new(settlement_signer(&config)?);

    let app = action_router(signer)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let sig_down = SigDown::try_new()?;
    let token = sig_down.cancellation_token();

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Settlement action listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    sig_down.recv().await;
    tracing::info!("Settlement action shut down gracefully");
    Ok(())
}
