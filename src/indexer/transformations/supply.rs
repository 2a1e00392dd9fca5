use alloy_primitives::U256;
use tracing::{debug, warn};

use crate::models::datasets::supply::{ChangeType, LedgerEntry, SkipReason, SupplyChange};
use crate::models::datasets::transfers::TransferEvent;
use crate::models::errors::SupplyError;

pub trait SupplyTransformer {
    fn transform_supply(&self, prior_supply: U256) -> Result<SupplyChange, SupplyError>;
}

impl SupplyTransformer for TransferEvent {
    fn transform_supply(&self, prior_supply: U256) -> Result<SupplyChange, SupplyError> {
        if self.is_zero_to_zero() {
            warn!(
                "Anomalous transfer of {} from zero address to zero address on chain {} at block {} log {}. Skipping.",
                self.amount, self.chain_id, self.block_number, self.log_index
            );
            return Ok(SupplyChange::Skipped(SkipReason::ZeroToZero));
        }

        let (current_supply, change_type) = if self.is_mint() {
            let supply = prior_supply
                .checked_add(self.amount)
                .ok_or(SupplyError::Overflow {
                    chain_id: self.chain_id,
                    prior: prior_supply,
                    amount: self.amount,
                })?;
            (supply, ChangeType::Mint)
        } else if self.is_burn() {
            let supply = prior_supply
                .checked_sub(self.amount)
                .ok_or(SupplyError::Underflow {
                    chain_id: self.chain_id,
                    prior: prior_supply,
                    amount: self.amount,
                })?;
            (supply, ChangeType::Burn)
        } else {
            return Ok(SupplyChange::Skipped(SkipReason::HolderTransfer));
        };

        debug!(
            "Chain {} block {} log {}: {} {} -> supply {}",
            self.chain_id,
            self.block_number,
            self.log_index,
            change_type.as_str(),
            self.amount,
            current_supply
        );

        Ok(SupplyChange::Applied(LedgerEntry::from_event(
            self,
            current_supply,
            change_type,
        )))
    }
}

/// Apply one transfer to the chain's prior total supply.
///
/// Mints (`from` is the zero address) add `amount`, burns (`to` is the zero
/// address) subtract it. Holder-to-holder transfers and the degenerate
/// zero-to-zero transfer leave supply untouched and produce no entry.
/// Nothing is persisted here; the caller appends the returned entry.
pub fn apply(prior_supply: U256, event: &TransferEvent) -> Result<SupplyChange, SupplyError> {
    event.transform_supply(prior_supply)
}
