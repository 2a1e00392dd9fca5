use alloy_primitives::U256;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::models::datasets::supply::LedgerEntry;
use crate::models::errors::StoreError;
use crate::storage::SupplyStore;

/// File the ledger appends to. Split out so a failed write can be rolled back.
trait AppendTarget: Write {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write one complete record. On a write error the target is cut back to
/// `len` so no partial or rejected record survives. Returns the new length.
fn append_record<T: AppendTarget>(
    target: &mut T,
    len: u64,
    record: &[u8],
) -> Result<u64, (io::Error, Option<io::Error>)> {
    match target.write_all(record).and_then(|()| target.flush()) {
        Ok(()) => Ok(len + record.len() as u64),
        Err(write_err) => match target.truncate_to(len) {
            Ok(()) => Err((write_err, None)),
            Err(truncate_err) => Err((write_err, Some(truncate_err))),
        },
    }
}

struct JsonlState {
    file: File,
    // Length of the file after the last committed record
    len: u64,
    // Set when a failed write could not be rolled back
    failed: bool,
    entries: HashMap<String, LedgerEntry>,
    latest_supply: HashMap<u64, U256>,
}

/// Append-only ledger file, one JSON-encoded [`LedgerEntry`] per line.
///
/// The whole file is replayed on open to rebuild the id index and the latest
/// supply of every chain. Lines are never rewritten. Each record is written
/// with a single unbuffered write; a failed write is truncated away, and if
/// that also fails the store refuses further appends.
pub struct JsonlStore {
    path: PathBuf,
    state: Mutex<JsonlState>,
}

impl JsonlStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut entries = HashMap::new();
        let mut latest_supply = HashMap::new();
        for (index, line) in BufReader::new(&file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: LedgerEntry = serde_json::from_str(&line).map_err(|source| {
                StoreError::Corrupt {
                    line: index + 1,
                    source,
                }
            })?;
            // Later lines are newer, so they win
            latest_supply.insert(entry.chain_id, entry.current_supply);
            if let Some(previous) = entries.insert(entry.id.clone(), entry) {
                return Err(StoreError::DuplicateEntry { id: previous.id });
            }
        }
        let len = file.metadata()?.len();

        info!(
            "Opened ledger file {} with {} entries across {} chains",
            path.display(),
            entries.len(),
            latest_supply.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(JsonlState {
                file,
                len,
                failed: false,
                entries,
                latest_supply,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SupplyStore for JsonlStore {
    fn prior_supply(&self, chain_id: u64) -> Result<U256, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .latest_supply
            .get(&chain_id)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    fn append_entry(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        if state.failed {
            return Err(StoreError::Failed);
        }
        if state.entries.contains_key(&entry.id) {
            return Err(StoreError::DuplicateEntry { id: entry.id });
        }

        let mut record = serde_json::to_vec(&entry)?;
        record.push(b'\n');

        let len = state.len;
        let new_len = match append_record(&mut state.file, len, &record) {
            Ok(new_len) => new_len,
            Err((write_err, None)) => {
                warn!("Rolled back ledger entry {} after write error: {}", entry.id, write_err);
                return Err(write_err.into());
            }
            Err((write_err, Some(truncate_err))) => {
                error!(
                    "Could not roll back ledger entry {} in {}: {}. Refusing further appends.",
                    entry.id,
                    self.path.display(),
                    truncate_err
                );
                state.failed = true;
                return Err(write_err.into());
            }
        };

        state.len = new_len;
        state.latest_supply.insert(entry.chain_id, entry.current_supply);
        state.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    fn get_entry(&self, id: &str) -> Result<Option<LedgerEntry>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.entries.get(id).cloned())
    }
}
