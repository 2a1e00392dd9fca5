pub mod chain_processor;
pub mod source;
pub mod transformations;

use std::sync::Arc;
use tracing::debug;

use crate::indexer::transformations::supply::SupplyTransformer;
use crate::models::datasets::supply::SupplyChange;
use crate::models::datasets::transfers::TransferEvent;
use crate::models::errors::LedgerError;
use crate::storage::SupplyStore;

pub use chain_processor::{ChainSummary, DEFAULT_MAX_CHAINS, Indexer};

/// Runs the supply reducer against a store: read the chain's prior supply,
/// apply the event, append the resulting entry.
///
/// Nothing is written when the reducer fails, so an overflowing or
/// underflowing event leaves the store exactly as it was.
pub struct SupplyLedger<S: SupplyStore + ?Sized> {
    store: Arc<S>,
}

impl<S: SupplyStore + ?Sized> Clone for SupplyLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: SupplyStore + ?Sized> SupplyLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn process(&self, event: &TransferEvent) -> Result<SupplyChange, LedgerError> {
        let prior_supply = self.store.prior_supply(event.chain_id)?;
        let change = event.transform_supply(prior_supply)?;

        if let SupplyChange::Applied(entry) = &change {
            self.store.append_entry(entry.clone())?;
            debug!("Appended ledger entry {}", entry.id);
        }

        Ok(change)
    }
}
