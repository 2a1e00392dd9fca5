use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::models::datasets::transfers::TransferEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Mint,
    Burn,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Mint => "mint",
            ChangeType::Burn => "burn",
        }
    }
}

/////////////////////////////////// Ledger Data ////////////////////////////////////////
// Immutable total-supply record, one per mint or burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub chain_id: u64,
    pub current_supply: U256,
    pub change_amount: U256,
    pub change_type: ChangeType,
    pub block_number: U256,
    pub timestamp: U256,
}

impl LedgerEntry {
    pub fn from_event(event: &TransferEvent, current_supply: U256, change_type: ChangeType) -> Self {
        Self {
            id: entry_id(event.chain_id, event.block_number, event.log_index),
            chain_id: event.chain_id,
            current_supply,
            change_amount: event.amount,
            change_type,
            block_number: U256::from(event.block_number),
            timestamp: U256::from(event.block_timestamp),
        }
    }
}

/// Composite primary key `{chain_id}_{block_number}_{log_index}`.
pub fn entry_id(chain_id: u64, block_number: u64, log_index: u64) -> String {
    format!("{}_{}_{}", chain_id, block_number, log_index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    // Transfer between two holders, supply untouched
    HolderTransfer,
    // Zero address on both sides; no well-formed token emits this
    ZeroToZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupplyChange {
    Applied(LedgerEntry),
    Skipped(SkipReason),
}

impl SupplyChange {
    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            SupplyChange::Applied(entry) => Some(entry),
            SupplyChange::Skipped(_) => None,
        }
    }
}
