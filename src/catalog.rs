//! The ordered, shuffled list of photos for one browsing session.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One discoverable photo, as produced by the library scan.
///
/// Immutable once scanned, except for `index`, which carries the most
/// recently resolved display position on records handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Absolute path of the backing file.
    pub path: PathBuf,
    /// File name used for display and for the exclusion/liked sets.
    pub name: String,
    /// Name of the containing folder (grouping key).
    pub folder: String,
    /// Filesystem modification time captured at scan time.
    pub file_date: DateTime<Utc>,
    /// Display position this record last resolved to.
    #[serde(default)]
    pub index: usize,
}

/// The catalog: photo records in shuffle order, positions `0..n-1`.
///
/// Replaced wholesale on rebuild, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<PhotoRecord>,
}

impl Catalog {
    pub fn new(records: Vec<PhotoRecord>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the record at `position`, if it exists.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&PhotoRecord> {
        self.records.get(position)
    }

    /// Borrow the full record list (read-only).
    #[must_use]
    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    /// Resolve `requested` to the first non-excluded position at or after
    /// it, scanning forward and wrapping at the end of the catalog.
    ///
    /// The returned record is a copy with its `index` slot set to the
    /// resolved position. If `requested` itself is eligible it is returned
    /// unchanged.
    ///
    /// # Errors
    /// [`Error::EmptyCatalog`] when there are no records,
    /// [`Error::OutOfRange`] when `requested` is not a valid position, and
    /// [`Error::AllExcluded`] when the scan comes back around without
    /// finding an eligible record.
    pub fn resolve(
        &self,
        requested: usize,
        excluded: &HashSet<String>,
    ) -> Result<(usize, PhotoRecord), Error> {
        let n = self.records.len();
        if n == 0 {
            return Err(Error::EmptyCatalog);
        }
        if requested >= n {
            return Err(Error::OutOfRange {
                position: requested,
                len: n,
            });
        }

        for step in 0..n {
            let position = (requested + step) % n;
            let record = &self.records[position];
            if !excluded.contains(&record.name) {
                let mut resolved = record.clone();
                resolved.index = position;
                return Ok((position, resolved));
            }
        }
        Err(Error::AllExcluded)
    }
}
