//! modguard - exemption-aware moderation bot.
//!
//! Speaks line-delimited JSON with the platform adapter over stdin/stdout.
//! Logs go to stderr.

use modguard::bridge::{self, Bridge, BridgeTransport, Stopped};
use modguard::config::{Config, validation};
use modguard::db::{Database, DelayStore, ExemptionStore};
use modguard::transport::Transport;
use modguard::{Engine, EngineParams, http, metrics};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "modguard.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }
    let owner = config
        .bot
        .owner_id
        .ok_or_else(|| anyhow::anyhow!("bot.owner_id is required"))?;

    info!(%owner, database = %config.database.path, "Starting modguard");

    // Initialize database
    let db = Arc::new(Database::new(&config.database.path).await?);

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 (or unset) disables the HTTP endpoint.
    let metrics_port = config.bot.metrics_port.unwrap_or(0);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let (outbound_tx, outbound_rx) = mpsc::channel(bridge::OUTBOUND_QUEUE);
    let transport = Arc::new(BridgeTransport::new(outbound_tx));

    let engine = Arc::new(Engine::new(EngineParams {
        exemptions: Arc::clone(&db) as Arc<dyn ExemptionStore>,
        delays: Arc::clone(&db) as Arc<dyn DelayStore>,
        transport: Arc::clone(&transport) as Arc<dyn Transport>,
        owner,
        log_space: config.bot.log_space,
        moderation: &config.moderation,
    }));

    let writer = tokio::spawn(bridge::write_frames(tokio::io::stdout(), outbound_rx));
    let bridge = Bridge::new(Arc::clone(&engine), transport);

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for interrupts");
                std::future::pending::<()>().await;
            }
        }
    };
    let stopped = match bridge.run_until(tokio::io::stdin(), interrupt).await {
        Ok(stopped) => stopped,
        Err(e) => {
            error!(error = %e, "Bridge input failed");
            Stopped::InputClosed
        }
    };

    engine.shutdown();

    // Every transport handle must go before the writer sees end-of-stream.
    drop(bridge);
    drop(engine);
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Bridge output failed"),
        Err(e) => warn!(error = %e, "Bridge writer task panicked"),
    }

    db.pool().close().await;
    info!("Shutdown complete");

    // The stdin read may still be parked on a blocking thread, which would
    // keep the runtime from shutting down.
    if stopped == Stopped::Interrupted {
        std::process::exit(0);
    }
    Ok(())
}
