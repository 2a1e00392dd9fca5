use alloy_primitives::U256;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::indexer::SupplyLedger;
use crate::metrics::Metrics;
use crate::models::datasets::supply::{ChangeType, SkipReason, SupplyChange};
use crate::models::datasets::transfers::{EventPosition, TransferEvent};
use crate::models::errors::LedgerError;
use crate::storage::SupplyStore;

const MAX_CHANNEL_CAPACITY: usize = 1024;
// Each chain holds a blocking-pool thread for the whole run; tokio's pool
// defaults to 512 threads, and a worker that never starts would stall `dispatch`.
pub const DEFAULT_MAX_CHAINS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub chain_id: u64,
    pub events_processed: u64,
    pub mints: u64,
    pub burns: u64,
    pub skipped: u64,
    pub anomalous: u64,
    pub final_supply: U256,
    pub last_position: Option<EventPosition>,
}

impl ChainSummary {
    fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            events_processed: 0,
            mints: 0,
            burns: 0,
            skipped: 0,
            anomalous: 0,
            final_supply: U256::ZERO,
            last_position: None,
        }
    }
}

struct ChainWorker {
    tx: Sender<TransferEvent>,
    handle: JoinHandle<Result<ChainSummary, LedgerError>>,
}

/// Routes transfer events to one worker per chain.
///
/// Each worker owns its chain's stream and handles events strictly in the
/// order they were dispatched, so prior supply is always read after the
/// previous entry was appended. Chains run independently of each other.
///
/// Every worker occupies a blocking thread until [`Indexer::finish`], so the
/// number of distinct chains is capped (see [`DEFAULT_MAX_CHAINS`]); an event
/// for a chain beyond the cap is rejected instead of queued.
pub struct Indexer<S: SupplyStore + ?Sized + 'static> {
    ledger: SupplyLedger<S>,
    metrics: Option<Metrics>,
    workers: HashMap<u64, ChainWorker>,
    max_chains: usize,
}

impl<S: SupplyStore + ?Sized + 'static> Indexer<S> {
    pub fn new(store: Arc<S>, metrics: Option<Metrics>) -> Self {
        Self {
            ledger: SupplyLedger::new(store),
            metrics,
            workers: HashMap::new(),
            max_chains: DEFAULT_MAX_CHAINS,
        }
    }

    /// Keep the cap below the runtime's `max_blocking_threads` when that is lowered.
    pub fn with_max_chains(mut self, max_chains: usize) -> Self {
        self.max_chains = max_chains;
        self
    }

    pub async fn dispatch(&mut self, event: TransferEvent) -> Result<()> {
        let chain_id = event.chain_id;
        if !self.workers.contains_key(&chain_id) && self.workers.len() >= self.max_chains {
            return Err(anyhow!(
                "Cannot start a worker for chain {}: limit of {} chains reached",
                chain_id,
                self.max_chains
            ));
        }

        let ledger = &self.ledger;
        let metrics = &self.metrics;
        let worker = self
            .workers
            .entry(chain_id)
            .or_insert_with(|| spawn_worker(chain_id, ledger.clone(), metrics.clone()));

        if let Some(metrics) = &self.metrics {
            metrics
                .channel_capacity
                .record(worker.tx.capacity() as u64, &metrics.labels(chain_id));
        }

        if worker.tx.send(event).await.is_ok() {
            return Ok(());
        }

        // The receiver only goes away when the worker has stopped on an error
        let Some(worker) = self.workers.remove(&chain_id) else {
            return Err(anyhow!("Worker for chain {} is missing", chain_id));
        };
        match worker.handle.await {
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(_)) => Err(anyhow!("Worker for chain {} stopped early", chain_id)),
            Err(e) => Err(anyhow!("Worker for chain {} panicked: {}", chain_id, e)),
        }
    }

    /// Close every chain's channel and wait for the workers to drain.
    /// Returns the summaries ordered by chain id, or the first worker error.
    pub async fn finish(self) -> Result<Vec<ChainSummary>> {
        let mut summaries = Vec::with_capacity(self.workers.len());
        let mut first_error = None;

        for (chain_id, worker) in self.workers {
            drop(worker.tx);
            match worker.handle.await {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => {
                    error!("Worker for chain {} failed: {}", chain_id, e);
                    first_error.get_or_insert_with(|| anyhow::Error::from(e));
                }
                Err(e) => {
                    error!("Worker for chain {} panicked: {}", chain_id, e);
                    first_error
                        .get_or_insert_with(|| anyhow!("Worker for chain {} panicked: {}", chain_id, e));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        summaries.sort_by_key(|summary| summary.chain_id);
        Ok(summaries)
    }
}

fn spawn_worker<S: SupplyStore + ?Sized + 'static>(
    chain_id: u64,
    ledger: SupplyLedger<S>,
    metrics: Option<Metrics>,
) -> ChainWorker {
    let (tx, rx) = mpsc::channel(MAX_CHANNEL_CAPACITY);
    info!("Starting worker for chain {}", chain_id);

    // Store calls are synchronous and may hit the disk, so each chain gets a blocking thread
    let handle = tokio::task::spawn_blocking(move || {
        let result = run_worker(chain_id, rx, &ledger, metrics.as_ref());
        match &result {
            Ok(summary) => info!(
                "Worker for chain {} shut down after {} events ({} mints, {} burns), supply {}",
                chain_id, summary.events_processed, summary.mints, summary.burns, summary.final_supply
            ),
            Err(e) => error!("Worker for chain {} stopped: {}", chain_id, e),
        }
        result
    });

    ChainWorker { tx, handle }
}

fn run_worker<S: SupplyStore + ?Sized>(
    chain_id: u64,
    mut rx: Receiver<TransferEvent>,
    ledger: &SupplyLedger<S>,
    metrics: Option<&Metrics>,
) -> Result<ChainSummary, LedgerError> {
    let mut summary = ChainSummary::new(chain_id);

    while let Some(event) = rx.blocking_recv() {
        let position = event.position();
        if let Some(last) = summary.last_position {
            if position <= last {
                return Err(LedgerError::OutOfOrder {
                    chain_id,
                    last,
                    got: position,
                });
            }
        }

        let change = ledger.process(&event)?;
        summary.events_processed += 1;
        summary.last_position = Some(position);

        match &change {
            SupplyChange::Applied(entry) => match entry.change_type {
                ChangeType::Mint => summary.mints += 1,
                ChangeType::Burn => summary.burns += 1,
            },
            SupplyChange::Skipped(SkipReason::HolderTransfer) => summary.skipped += 1,
            SupplyChange::Skipped(SkipReason::ZeroToZero) => summary.anomalous += 1,
        }

        if let Some(metrics) = metrics {
            record_change(metrics, chain_id, &event, &change);
        }
    }

    debug!("Channel for chain {} closed", chain_id);
    summary.final_supply = ledger.store().prior_supply(chain_id)?;
    Ok(summary)
}

fn record_change(metrics: &Metrics, chain_id: u64, event: &TransferEvent, change: &SupplyChange) {
    let labels = metrics.labels(chain_id);
    metrics.events_processed.add(1, &labels);
    match change {
        SupplyChange::Applied(entry) => match entry.change_type {
            ChangeType::Mint => metrics.mints.add(1, &labels),
            ChangeType::Burn => metrics.burns.add(1, &labels),
        },
        SupplyChange::Skipped(SkipReason::HolderTransfer) => {
            metrics.skipped_transfers.add(1, &labels)
        }
        SupplyChange::Skipped(SkipReason::ZeroToZero) => metrics.anomalous_events.add(1, &labels),
    }
    metrics
        .latest_processed_block
        .record(event.block_number, &labels);
}
