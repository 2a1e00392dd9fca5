use alloy_primitives::U256;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::datasets::supply::LedgerEntry;
use crate::models::errors::StoreError;
use crate::storage::SupplyStore;

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, LedgerEntry>,
    // Order of appends, so entries can be listed the way they were written
    order: Vec<String>,
    latest_supply: HashMap<u64, U256>,
}

/// In-memory ledger, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.order.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Entries for one chain in append order.
    pub fn entries_for_chain(&self, chain_id: u64) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .filter(|entry| entry.chain_id == chain_id)
            .cloned()
            .collect())
    }
}

impl SupplyStore for MemoryStore {
    fn prior_supply(&self, chain_id: u64) -> Result<U256, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .latest_supply
            .get(&chain_id)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    fn append_entry(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        if state.entries.contains_key(&entry.id) {
            return Err(StoreError::DuplicateEntry { id: entry.id });
        }

        state.latest_supply.insert(entry.chain_id, entry.current_supply);
        state.order.push(entry.id.clone());
        state.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    fn get_entry(&self, id: &str) -> Result<Option<LedgerEntry>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.entries.get(id).cloned())
    }
}
