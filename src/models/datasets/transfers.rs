use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

////////////////////////////////////// Event Data //////////////////////////////////////
// One decoded ERC-20 `Transfer(from, to, amount)` log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub amount: U256,
    pub chain_id: u64,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub log_index: u64,
}

impl TransferEvent {
    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }

    pub fn is_mint(&self) -> bool {
        self.from == Address::ZERO && self.to != Address::ZERO
    }

    pub fn is_burn(&self) -> bool {
        self.to == Address::ZERO && self.from != Address::ZERO
    }

    // Neither mint nor burn; no well-formed token emits this
    pub fn is_zero_to_zero(&self) -> bool {
        self.from == Address::ZERO && self.to == Address::ZERO
    }
}

/// Position of a log within its chain. Ordered by block, then by log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} log {}", self.block_number, self.log_index)
    }
}
