use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use crate::models::datasets::transfers::TransferEvent;

/// Read an exported stream of transfer events, one JSON object per line.
/// Blank lines are ignored. Events are returned in file order.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<TransferEvent>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open events file {}", path.display()))?;

    let events = parse_events(BufReader::new(file))
        .with_context(|| format!("failed to parse events file {}", path.display()))?;

    info!("Loaded {} transfer events from {}", events.len(), path.display());
    Ok(events)
}

pub fn parse_events<R: BufRead>(reader: R) -> Result<Vec<TransferEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read events line")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: TransferEvent = serde_json::from_str(&line)
            .with_context(|| format!("invalid transfer event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}
