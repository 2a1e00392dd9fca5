use alloy_primitives::U256;
use thiserror::Error;

use crate::models::datasets::transfers::EventPosition;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupplyError {
    #[error("Supply overflow on chain {chain_id}: {prior} + {amount} exceeds the 256-bit range")]
    Overflow {
        chain_id: u64,
        prior: U256,
        amount: U256,
    },
    #[error("Supply underflow on chain {chain_id}: cannot burn {amount} from a supply of {prior}")]
    Underflow {
        chain_id: u64,
        prior: U256,
        amount: U256,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate ledger entry id: {id}")]
    DuplicateEntry { id: String },
    #[error("Corrupt ledger record on line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Ledger store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ledger entry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Ledger store refuses writes after a failed rollback")]
    Failed,
    #[error("Ledger store lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Supply(#[from] SupplyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Out-of-order event on chain {chain_id}: {got} does not follow {last}")]
    OutOfOrder {
        chain_id: u64,
        last: EventPosition,
        got: EventPosition,
    },
}
