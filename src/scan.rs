//! Library scanning and the catalog refresh pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::carousel::Carousel;
use crate::catalog::PhotoRecord;
use crate::config::Configuration;
use crate::persist;

/// Extensions the scanner admits (lowercase, without dot).
const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Return `true` if `path` has an allowed image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTS.iter().any(|e| *e == ext)
        })
}

/// Walk `root` recursively and build a record for every image file found.
///
/// Unreadable entries are logged and skipped; an empty result is not an
/// error here, it surfaces downstream as the no-data status.
pub fn scan_library(root: &Path) -> Vec<PhotoRecord> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !should_skip_dir(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_supported_image(path) {
            continue;
        }
        match record_for(path) {
            Some(record) => out.push(record),
            None => debug!(path = %path.display(), "skipping unstattable file"),
        }
    }
    if out.is_empty() {
        warn!(root = %root.display(), "scan found no images");
    } else {
        info!(root = %root.display(), count = out.len(), "library scan complete");
    }
    out
}

fn record_for(path: &Path) -> Option<PhotoRecord> {
    let name = path.file_name()?.to_str()?.to_string();
    let folder = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let modified = path.metadata().and_then(|m| m.modified()).ok()?;
    Some(PhotoRecord {
        path: path.to_path_buf(),
        name,
        folder,
        file_date: DateTime::<Utc>::from(modified),
        index: 0,
    })
}

fn should_skip_dir(entry: &DirEntry) -> bool {
    // Never skip the root; tempfile roots can be dot-dirs.
    if entry.depth() == 0 {
        return false;
    }
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}

/// Shuffle `records` in place with a deterministic seeded RNG, so the same
/// library contents always produce the same browsing order.
pub fn shuffle_records(records: &mut [PhotoRecord], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    records.shuffle(&mut rng);
}

/// Run the full refresh pipeline: scan on the blocking pool, shuffle with
/// the configured seed, persist the list, then swap it into the carousel.
///
/// Persistence failures are logged and do not block the swap. Concurrent
/// invocations are allowed; each completes its own swap, last one wins.
pub async fn rebuild_catalog(carousel: &Carousel, config: &Configuration) -> Result<usize> {
    let root = config.library_path.clone();
    let seed = config.shuffle_seed;
    let mut records = tokio::task::spawn_blocking(move || scan_library(&root))
        .await
        .context("library scan task failed")?;
    shuffle_records(&mut records, seed);
    if let Err(err) = persist::save_records(&config.records_file, &records).await {
        warn!(path = %config.records_file.display(), error = %err, "failed to persist record list");
    }
    let count = records.len();
    carousel.rebuild(records).await;
    info!(count, "catalog rebuilt");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_supported_image(Path::new("/p/a.jpg")));
        assert!(is_supported_image(Path::new("/p/a.JPEG")));
        assert!(is_supported_image(Path::new("/p/a.WebP")));
        assert!(!is_supported_image(Path::new("/p/a.txt")));
        assert!(!is_supported_image(Path::new("/p/noext")));
    }

    #[test]
    fn shuffle_is_deterministic_per_seed() {
        let make = || -> Vec<PhotoRecord> {
            (0..32)
                .map(|i| PhotoRecord {
                    path: PathBuf::from(format!("/p/{i}.jpg")),
                    name: format!("{i}.jpg"),
                    folder: "p".to_string(),
                    file_date: Utc::now(),
                    index: 0,
                })
                .collect()
        };

        let mut a = make();
        let mut b = make();
        shuffle_records(&mut a, 1);
        shuffle_records(&mut b, 1);
        assert_eq!(
            a.iter().map(|r| &r.name).collect::<Vec<_>>(),
            b.iter().map(|r| &r.name).collect::<Vec<_>>()
        );

        let mut c = make();
        shuffle_records(&mut c, 2);
        assert_ne!(
            a.iter().map(|r| &r.name).collect::<Vec<_>>(),
            c.iter().map(|r| &r.name).collect::<Vec<_>>()
        );
    }
}
