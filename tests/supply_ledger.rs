use std::io::Write;
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, U256, address};
use proptest::prelude::*;

use supply_ledger::indexer::SupplyLedger;
use supply_ledger::indexer::transformations::supply::apply;
use supply_ledger::models::datasets::supply::{ChangeType, LedgerEntry, SkipReason, SupplyChange};
use supply_ledger::models::datasets::transfers::TransferEvent;
use supply_ledger::models::errors::{LedgerError, StoreError, SupplyError};
use supply_ledger::storage::{MemoryStore, SupplyStore};

const HOLDER: Address = address!("1234567890123456789012345678901234567890");
const OTHER_HOLDER: Address = address!("abcdefabcdefabcdefabcdefabcdefabcdefabcd");
const CHAIN_ID: u64 = 1;

fn transfer(from: Address, to: Address, amount: u64, block_number: u64, log_index: u64) -> TransferEvent {
    TransferEvent {
        from,
        to,
        amount: U256::from(amount),
        chain_id: CHAIN_ID,
        block_number,
        block_timestamp: 1_700_000_000 + block_number * 12,
        log_index,
    }
}

fn mint(amount: u64, block_number: u64, log_index: u64) -> TransferEvent {
    transfer(Address::ZERO, HOLDER, amount, block_number, log_index)
}

fn burn(amount: u64, block_number: u64, log_index: u64) -> TransferEvent {
    transfer(HOLDER, Address::ZERO, amount, block_number, log_index)
}

fn applied(change: SupplyChange) -> LedgerEntry {
    match change {
        SupplyChange::Applied(entry) => entry,
        SupplyChange::Skipped(reason) => panic!("expected a ledger entry, got {:?}", reason),
    }
}

#[test]
fn mint_from_zero_address_creates_entry() {
    let store = Arc::new(MemoryStore::new());
    let ledger = SupplyLedger::new(store.clone());
    let event = mint(1_000_000, 100, 0);

    ledger.process(&event).unwrap();

    let actual = store.get_entry("1_100_0").unwrap().unwrap();
    let expected = LedgerEntry {
        id: format!("{}_{}_{}", event.chain_id, event.block_number, event.log_index),
        chain_id: CHAIN_ID,
        current_supply: U256::from(1_000_000u64),
        change_amount: U256::from(1_000_000u64),
        change_type: ChangeType::Mint,
        block_number: U256::from(event.block_number),
        timestamp: U256::from(event.block_timestamp),
    };
    assert_eq!(actual, expected);
}

#[test]
fn burn_to_zero_address_after_mint() {
    let store = Arc::new(MemoryStore::new());
    let ledger = SupplyLedger::new(store.clone());

    ledger.process(&mint(1_000_000, 100, 0)).unwrap();
    let burn_event = burn(500_000, 101, 4);
    ledger.process(&burn_event).unwrap();

    let actual = store.get_entry("1_101_4").unwrap().unwrap();
    let expected = LedgerEntry {
        id: "1_101_4".to_string(),
        chain_id: CHAIN_ID,
        current_supply: U256::from(500_000u64),
        change_amount: U256::from(500_000u64),
        change_type: ChangeType::Burn,
        block_number: U256::from(101u64),
        timestamp: U256::from(burn_event.block_timestamp),
    };
    assert_eq!(actual, expected);
    assert_eq!(store.prior_supply(CHAIN_ID).unwrap(), U256::from(500_000u64));
}

#[test]
fn burn_exceeding_supply_is_rejected_without_writing() {
    let store = Arc::new(MemoryStore::new());
    let ledger = SupplyLedger::new(store.clone());
    ledger.process(&mint(100, 1, 0)).unwrap();

    let err = ledger.process(&burn(101, 2, 0)).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Supply(SupplyError::Underflow { chain_id: CHAIN_ID, .. })
    ));
    assert!(store.get_entry("1_2_0").unwrap().is_none());
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.prior_supply(CHAIN_ID).unwrap(), U256::from(100u64));
}

#[test]
fn mint_overflow_is_rejected() {
    let mut event = mint(0, 5, 0);
    event.amount = U256::from(2u64);

    let err = apply(U256::MAX - U256::from(1u64), &event).unwrap_err();
    assert_eq!(
        err,
        SupplyError::Overflow {
            chain_id: CHAIN_ID,
            prior: U256::MAX - U256::from(1u64),
            amount: U256::from(2u64),
        }
    );

    // Landing exactly on the maximum is fine
    event.amount = U256::from(1u64);
    let entry = applied(apply(U256::MAX - U256::from(1u64), &event).unwrap());
    assert_eq!(entry.current_supply, U256::MAX);
}

#[test]
fn holder_transfer_leaves_supply_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let ledger = SupplyLedger::new(store.clone());
    ledger.process(&mint(1_000, 1, 0)).unwrap();

    let change = ledger
        .process(&transfer(HOLDER, OTHER_HOLDER, 400, 2, 0))
        .unwrap();

    assert_eq!(change, SupplyChange::Skipped(SkipReason::HolderTransfer));
    assert!(store.get_entry("1_2_0").unwrap().is_none());
    assert_eq!(store.prior_supply(CHAIN_ID).unwrap(), U256::from(1_000u64));
}

#[test]
fn zero_to_zero_transfer_is_anomalous_noop() {
    let event = transfer(Address::ZERO, Address::ZERO, 77, 3, 1);
    let change = apply(U256::from(10u64), &event).unwrap();
    assert_eq!(change, SupplyChange::Skipped(SkipReason::ZeroToZero));
    assert!(change.entry().is_none());
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn zero_to_zero_transfer_is_logged_as_anomalous() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let event = transfer(Address::ZERO, Address::ZERO, 77, 3, 1);
    let change = tracing::subscriber::with_default(subscriber, || {
        apply(U256::from(10u64), &event).unwrap()
    });
    assert_eq!(change, SupplyChange::Skipped(SkipReason::ZeroToZero));

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("WARN"), "{}", output);
    assert!(output.contains("Anomalous transfer of 77"), "{}", output);
}

#[test]
fn overflowing_mint_leaves_store_untouched() {
    let store = Arc::new(MemoryStore::new());
    store
        .append_entry(LedgerEntry {
            id: "1_1_0".to_string(),
            chain_id: CHAIN_ID,
            current_supply: U256::MAX,
            change_amount: U256::MAX,
            change_type: ChangeType::Mint,
            block_number: U256::from(1u64),
            timestamp: U256::ZERO,
        })
        .unwrap();
    let ledger = SupplyLedger::new(store.clone());

    let err = ledger.process(&mint(1, 2, 0)).unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Supply(SupplyError::Overflow { chain_id: CHAIN_ID, .. })
    ));
    assert_eq!(store.prior_supply(CHAIN_ID).unwrap(), U256::MAX);
    assert!(store.get_entry("1_2_0").unwrap().is_none());
    assert_eq!(store.len().unwrap(), 1);
}

#[test]
fn zero_amount_mint_and_burn_are_recorded() {
    let mint_entry = applied(apply(U256::from(5u64), &mint(0, 1, 0)).unwrap());
    assert_eq!(mint_entry.current_supply, U256::from(5u64));
    assert_eq!(mint_entry.change_amount, U256::ZERO);
    assert_eq!(mint_entry.change_type, ChangeType::Mint);

    let burn_entry = applied(apply(U256::ZERO, &burn(0, 1, 1)).unwrap());
    assert_eq!(burn_entry.current_supply, U256::ZERO);
    assert_eq!(burn_entry.change_type, ChangeType::Burn);
}

#[test]
fn entry_id_is_deterministic() {
    let mut event = mint(9, 19_000_000, 42);
    event.chain_id = 137;

    let first = applied(apply(U256::ZERO, &event).unwrap());
    let second = applied(apply(U256::ZERO, &event).unwrap());
    assert_eq!(first.id, "137_19000000_42");
    assert_eq!(first.id, second.id);
    assert_eq!(first.chain_id, 137);
}

#[test]
fn block_fields_are_widened_not_truncated() {
    let mut event = mint(1, u64::MAX, 0);
    event.block_timestamp = u64::MAX;

    let entry = applied(apply(U256::ZERO, &event).unwrap());
    assert_eq!(entry.block_number, U256::from(u64::MAX));
    assert_eq!(entry.timestamp, U256::from(u64::MAX));
}

#[test]
fn redelivered_event_is_rejected_as_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let ledger = SupplyLedger::new(store.clone());
    let event = mint(10, 1, 0);

    ledger.process(&event).unwrap();
    let err = ledger.process(&event).unwrap_err();

    match err {
        LedgerError::Store(StoreError::DuplicateEntry { id }) => assert_eq!(id, "1_1_0"),
        other => panic!("expected duplicate entry error, got {other:?}"),
    }
    assert_eq!(store.prior_supply(CHAIN_ID).unwrap(), U256::from(10u64));
}

#[test]
fn chains_keep_independent_supply() {
    let store = Arc::new(MemoryStore::new());
    let ledger = SupplyLedger::new(store.clone());

    let mut polygon_mint = mint(300, 1, 0);
    polygon_mint.chain_id = 137;

    ledger.process(&mint(1_000, 1, 0)).unwrap();
    ledger.process(&polygon_mint).unwrap();
    ledger.process(&burn(250, 2, 0)).unwrap();

    assert_eq!(store.prior_supply(CHAIN_ID).unwrap(), U256::from(750u64));
    assert_eq!(store.prior_supply(137).unwrap(), U256::from(300u64));
    assert_eq!(store.prior_supply(10).unwrap(), U256::ZERO);
    assert_eq!(store.entries_for_chain(CHAIN_ID).unwrap().len(), 2);
    assert_eq!(store.entries_for_chain(137).unwrap().len(), 1);
}

#[derive(Debug, Clone)]
enum Step {
    Mint(u64),
    Burn(u64),
    Transfer(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..1_000_000u64).prop_map(Step::Mint),
        (0..1_000_000u64).prop_map(Step::Burn),
        (0..1_000_000u64).prop_map(Step::Transfer),
    ]
}

proptest! {
    #[test]
    fn final_supply_is_mints_minus_burns(steps in prop::collection::vec(step(), 0..64)) {
        let store = Arc::new(MemoryStore::new());
        let ledger = SupplyLedger::new(store.clone());
        let mut expected: u128 = 0;
        let mut entries = 0usize;

        for (index, step) in steps.iter().enumerate() {
            let block_number = index as u64 + 1;
            match step {
                Step::Mint(amount) => {
                    ledger.process(&mint(*amount, block_number, 0)).unwrap();
                    expected += *amount as u128;
                    entries += 1;
                }
                Step::Burn(amount) => {
                    let result = ledger.process(&burn(*amount, block_number, 0));
                    if (*amount as u128) <= expected {
                        prop_assert!(result.is_ok());
                        expected -= *amount as u128;
                        entries += 1;
                    } else {
                        let is_underflow = matches!(
                            result,
                            Err(LedgerError::Supply(SupplyError::Underflow { .. }))
                        );
                        prop_assert!(is_underflow);
                    }
                }
                Step::Transfer(amount) => {
                    let change = ledger
                        .process(&transfer(HOLDER, OTHER_HOLDER, *amount, block_number, 0))
                        .unwrap();
                    prop_assert_eq!(change, SupplyChange::Skipped(SkipReason::HolderTransfer));
                }
            }
        }

        prop_assert_eq!(store.prior_supply(CHAIN_ID).unwrap(), U256::from(expected));
        prop_assert_eq!(store.len().unwrap(), entries);
    }
}
