//! quiz-chain - HTTP Server Entry Point
//!
//! Starts the HTTP server that accepts quiz chain runs.

use quiz_chain::{api, config::Config};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiz_chain=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={} watchdog={:?} retry_limit={}",
        config.default_model, config.chain.watchdog, config.chain.thresholds.retry_limit
    );
    if let Err(e) = config.credentials() {
        warn!("{}; /solve will answer 500 until it is set", e);
    }

    api::serve(config).await
}
