use anyhow::Result;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

use supply_ledger::indexer::{Indexer, source::read_events};
use supply_ledger::metrics::Metrics;
use supply_ledger::storage::open_store;
use supply_ledger::utils::load_config;

const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    println!();
    info!("=========================== INITIALIZING ===========================");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Err(e);
        }
    };

    // Initialize optional metrics
    let metrics = if config.metrics.enabled {
        Some(Metrics::new(config.chain_name.clone())?)
    } else {
        info!("Metrics are disabled");
        None
    };

    // Start metrics server if metrics are enabled
    if let Some(metrics_instance) = &metrics {
        metrics_instance
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
    }

    let store = open_store(&config.store)?;
    let events = read_events(&config.events_path)?;

    let mut indexer = Indexer::new(store, metrics);

    println!();
    info!("========================= STARTING INDEXER =========================");

    let mut dispatched = 0usize;
    let total = events.len();
    let mut events = events.into_iter();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let Some(event) = events.next() else {
            info!("All {} events dispatched", total);
            break;
        };

        let result = tokio::select! {
            result = indexer.dispatch(event) => result,
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C signal, initiating shutdown after {} of {} events...", dispatched, total);
                break;
            }
        };

        if let Err(e) = result {
            error!("Stopping after {} of {} events: {:#}", dispatched, total, e);
            // Let the remaining chains drain before reporting the failure
            if let Err(finish_err) = indexer.finish().await {
                error!("Error while draining workers: {:#}", finish_err);
            }
            return Err(e);
        }
        dispatched += 1;
    }

    let summaries = indexer.finish().await?;
    for summary in &summaries {
        info!(
            "Chain {}: {} events, {} mints, {} burns, {} holder transfers, {} anomalous, total supply {}",
            summary.chain_id,
            summary.events_processed,
            summary.mints,
            summary.burns,
            summary.skipped,
            summary.anomalous,
            summary.final_supply
        );
    }

    info!("=========================== SHUTDOWN ===============================");
    Ok(())
}
