//! JSON persistence for the shuffled record list and the name sets.
//!
//! Loads are forgiving: a missing or unreadable file means "start empty".
//! Saves overwrite the whole file; the payloads are small.

use std::collections::HashSet;
use std::path::Path;

use tokio::fs;
use tracing::warn;

use crate::catalog::PhotoRecord;
use crate::error::Error;

/// Load the persisted record list, or an empty list if the file is missing
/// or does not parse.
pub async fn load_records(path: &Path) -> Vec<PhotoRecord> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unparseable record file");
            Vec::new()
        }
    }
}

/// Persist the record list as pretty-printed JSON.
pub async fn save_records(path: &Path, records: &[PhotoRecord]) -> Result<(), Error> {
    let raw = serde_json::to_string_pretty(records)?;
    fs::write(path, raw).await?;
    Ok(())
}

/// Load a persisted name set, or an empty set if the file is missing or
/// does not parse.
pub async fn load_names(path: &Path) -> HashSet<String> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(_) => return HashSet::new(),
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(names) => names.into_iter().collect(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unparseable name-set file");
            HashSet::new()
        }
    }
}

/// Persist a name set as a sorted JSON array so the file diffs cleanly.
pub async fn save_names(path: &Path, names: &HashSet<String>) -> Result<(), Error> {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();
    let raw = serde_json::to_string_pretty(&sorted)?;
    fs::write(path, raw).await?;
    Ok(())
}
