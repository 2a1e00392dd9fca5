pub mod jsonl;
pub mod memory;

use alloy_primitives::U256;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::models::common::StoreConfig;
use crate::models::datasets::supply::LedgerEntry;
use crate::models::errors::StoreError;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

/// Persistence for ledger entries and the running supply of each chain.
///
/// Callers must serialize access per chain: read `prior_supply`, then
/// `append_entry`, before handling the chain's next event.
pub trait SupplyStore: Send + Sync {
    /// Supply after the most recently appended entry for `chain_id`, or zero.
    fn prior_supply(&self, chain_id: u64) -> Result<U256, StoreError>;

    /// Append an entry. An id that already exists is rejected, never overwritten.
    fn append_entry(&self, entry: LedgerEntry) -> Result<(), StoreError>;

    fn get_entry(&self, id: &str) -> Result<Option<LedgerEntry>, StoreError>;
}

// Open the configured store: a ledger file when a path is set, otherwise memory
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SupplyStore>> {
    match &config.path {
        Some(path) => {
            let store = JsonlStore::open(path)
                .with_context(|| format!("failed to open ledger file {}", path))?;
            info!("Using ledger file store at {}", path);
            Ok(Arc::new(store))
        }
        None => {
            info!("No store path configured, keeping ledger entries in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
