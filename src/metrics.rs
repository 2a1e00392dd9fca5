use std::sync::Arc;
use tracing::info;

use anyhow::Result;
use axum::{Router, routing::get};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, MeterProvider};
use opentelemetry_sdk::metrics::{MetricError, SdkMeterProvider};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<prometheus::Registry>,
    _provider: SdkMeterProvider,
    pub chain_name: String,

    // Event processing metrics
    pub events_processed: Counter<u64>,
    pub mints: Counter<u64>,
    pub burns: Counter<u64>,
    pub skipped_transfers: Counter<u64>,
    pub anomalous_events: Counter<u64>,
    pub latest_processed_block: Gauge<u64>,

    // MPSC channel metrics
    pub channel_capacity: Gauge<u64>,
}

impl Metrics {
    pub fn new(chain_name: String) -> Result<Self, MetricError> {
        // Create a new prometheus registry
        let registry = prometheus::Registry::new();

        // Configure OpenTelemetry to use this registry
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        // Set up a meter to create instruments
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("supply_ledger_metrics");

        let events_processed = meter
            .u64_counter("supply_ledger_events_processed")
            .with_description("Total number of transfer events processed")
            .build();

        let mints = meter
            .u64_counter("supply_ledger_mints")
            .with_description("Number of mint events applied to supply")
            .build();

        let burns = meter
            .u64_counter("supply_ledger_burns")
            .with_description("Number of burn events applied to supply")
            .build();

        let skipped_transfers = meter
            .u64_counter("supply_ledger_skipped_transfers")
            .with_description("Number of holder-to-holder transfers with no supply effect")
            .build();

        let anomalous_events = meter
            .u64_counter("supply_ledger_anomalous_events")
            .with_description("Number of zero-address to zero-address transfers seen")
            .build();

        let latest_processed_block = meter
            .u64_gauge("supply_ledger_latest_processed_block_number")
            .with_description("Latest block number processed")
            .build();

        let channel_capacity = meter
            .u64_gauge("supply_ledger_channel_capacity")
            .with_description("Available capacity of the chain worker channels")
            .build();

        Ok(Self {
            registry: Arc::new(registry),
            _provider: provider,
            chain_name,
            events_processed,
            mints,
            burns,
            skipped_transfers,
            anomalous_events,
            latest_processed_block,
            channel_capacity,
        })
    }

    pub fn labels(&self, chain_id: u64) -> [KeyValue; 2] {
        [
            KeyValue::new("chain", self.chain_name.clone()),
            KeyValue::new("chain_id", chain_id.to_string()),
        ]
    }

    /// Current metrics in the Prometheus text format, as served on `/metrics`.
    pub fn encode(&self) -> String {
        encode_registry(&self.registry)
    }

    pub async fn start_metrics_server(&self, addr: &str, port: u16) -> Result<()> {
        let addr = format!("{addr}:{port}").parse::<SocketAddr>()?;
        let registry = self.registry.clone();

        let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

        // Determine the access URL based on the binding address. Only used for logging.
        let access_url = if addr.ip().is_unspecified() {
            format!("http://localhost:{port}/metrics")
        } else {
            format!("http://{}:{port}/metrics", addr.ip())
        };

        info!(
            "Starting metrics server - binding to {} (accessible at {})",
            addr, access_url
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;

        // Spawn the server in a separate task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Metrics server stopped: {}", e);
            }
        });

        Ok(())
    }
}

async fn metrics_handler(registry: Arc<prometheus::Registry>) -> String {
    encode_registry(&registry)
}

fn encode_registry(registry: &prometheus::Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# failed to encode metrics: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
