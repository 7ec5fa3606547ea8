//! The carousel core: shuffled catalog, payload cache, load coordinator,
//! prefetch scheduler, and rebuild-time invalidation.
//!
//! Concurrency invariants:
//! - at most one loader runs per position, enforced by per-position locks
//!   handed out as owned guards;
//! - the generation counter changes only while the catalog write lock is
//!   held, and a load commits only if the generation it captured is still
//!   current, checked inside the cache critical section;
//! - rebuild acquires catalog(write), then tasks, locks, and cache in that
//!   order; a load never touches the catalog lock while holding a position
//!   lock, so the two paths cannot deadlock.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::catalog::{Catalog, PhotoRecord};
use crate::error::Error;

/// Byte source for photo payloads. Implementations are synchronous and run
/// on the blocking pool.
pub trait StorageReader: Send + Sync {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Default reader backed by the local filesystem.
#[derive(Debug, Default)]
pub struct FsReader;

impl StorageReader for FsReader {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// How `ensure_loaded` treats lock contention and failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Wait for the position lock and surface errors to the caller.
    Blocking,
    /// Give up on contention; failures are logged at debug and swallowed.
    BestEffort,
}

struct Inner {
    catalog: RwLock<Catalog>,
    excluded: RwLock<HashSet<String>>,
    liked: RwLock<HashSet<String>>,
    cache: Mutex<HashMap<usize, Bytes>>,
    locks: Mutex<HashMap<usize, Arc<Mutex<()>>>>,
    tasks: Mutex<HashMap<usize, JoinHandle<()>>>,
    generation: AtomicU64,
    reader: Arc<dyn StorageReader>,
}

/// Shared handle to the carousel state. Clones are cheap and all refer to
/// the same catalog, cache, and coordinator.
#[derive(Clone)]
pub struct Carousel {
    inner: Arc<Inner>,
}

impl Default for Carousel {
    fn default() -> Self {
        Self::new()
    }
}

impl Carousel {
    pub fn new() -> Self {
        Self::with_reader(Arc::new(FsReader))
    }

    /// Build a carousel over a custom byte source. Tests use this to inject
    /// counting and gated readers.
    pub fn with_reader(reader: Arc<dyn StorageReader>) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog: RwLock::new(Catalog::default()),
                excluded: RwLock::new(HashSet::new()),
                liked: RwLock::new(HashSet::new()),
                cache: Mutex::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                tasks: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                reader,
            }),
        }
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    #[must_use]
    pub async fn len(&self) -> usize {
        self.inner.catalog.read().await.len()
    }

    #[must_use]
    pub async fn is_empty(&self) -> bool {
        self.inner.catalog.read().await.is_empty()
    }

    /// Resolve `requested` against the current catalog and exclusion set.
    pub async fn resolve(&self, requested: usize) -> Result<(usize, PhotoRecord), Error> {
        let catalog = self.inner.catalog.read().await;
        let excluded = self.inner.excluded.read().await;
        catalog.resolve(requested, &excluded)
    }

    /// Cached payload for `position`, if one is present.
    #[must_use]
    pub async fn payload(&self, position: usize) -> Option<Bytes> {
        self.inner.cache.lock().await.get(&position).cloned()
    }

    /// Drop the cached payload for `position` after its file changed on disk.
    pub async fn invalidate_position(&self, position: usize) {
        self.inner.cache.lock().await.remove(&position);
    }

    /// Install persisted name sets, normally once at startup.
    pub async fn restore_sets(&self, excluded: HashSet<String>, liked: HashSet<String>) {
        *self.inner.excluded.write().await = excluded;
        *self.inner.liked.write().await = liked;
    }

    /// Add `name` to the exclusion set and return a snapshot of the set for
    /// persistence.
    pub async fn exclude(&self, name: String) -> HashSet<String> {
        let mut excluded = self.inner.excluded.write().await;
        excluded.insert(name);
        excluded.clone()
    }

    /// Add `name` to the liked set and return a snapshot of the set for
    /// persistence.
    pub async fn like(&self, name: String) -> HashSet<String> {
        let mut liked = self.inner.liked.write().await;
        liked.insert(name);
        liked.clone()
    }

    /// Make `position` the focused item: load its payload now, then kick
    /// off best-effort loads of both circular neighbors.
    ///
    /// On return the payload for `position` is cached, absent a concurrent
    /// rebuild. Neighbor failures never escape this boundary. A no-op on an
    /// empty catalog.
    pub async fn focus(&self, position: usize) -> Result<(), Error> {
        let len = self.inner.catalog.read().await.len();
        if len == 0 {
            return Ok(());
        }
        let position = position % len;
        self.ensure_loaded(position, LoadMode::Blocking).await?;
        for neighbor in [(position + len - 1) % len, (position + 1) % len] {
            if let Err(err) = self.ensure_loaded(neighbor, LoadMode::BestEffort).await {
                debug!(position = neighbor, error = %err, "neighbor prefetch skipped");
            }
        }
        Ok(())
    }

    /// Ensure the payload for `position` is cached, loading it if needed.
    ///
    /// At most one loader runs per position. `Blocking` waits its turn and
    /// reports errors; `BestEffort` returns immediately when another loader
    /// holds the position, trusting the load in flight.
    pub async fn ensure_loaded(&self, position: usize, mode: LoadMode) -> Result<(), Error> {
        if self.inner.cache.lock().await.contains_key(&position) {
            return Ok(());
        }

        // Capture generation and path under one catalog read so they agree.
        let (generation, path) = {
            let catalog = self.inner.catalog.read().await;
            let generation = self.generation();
            match catalog.get(position) {
                Some(record) => (generation, record.path.clone()),
                None => {
                    return Err(Error::OutOfRange {
                        position,
                        len: catalog.len(),
                    })
                }
            }
        };

        let lock = {
            let mut locks = self.inner.locks.lock().await;
            Arc::clone(locks.entry(position).or_default())
        };

        match mode {
            LoadMode::Blocking => {
                let guard = lock.lock_owned().await;
                self.load_locked(position, generation, path, guard).await
            }
            LoadMode::BestEffort => {
                let Ok(guard) = lock.try_lock_owned() else {
                    // A loader already holds this position.
                    return Ok(());
                };
                let this = self.clone();
                let handle = tokio::spawn(async move {
                    if let Err(err) = this.load_locked(position, generation, path, guard).await {
                        debug!(position, error = %err, "best-effort load failed");
                    }
                });
                let mut tasks = self.inner.tasks.lock().await;
                tasks.retain(|_, handle| !handle.is_finished());
                tasks.insert(position, handle);
                Ok(())
            }
        }
    }

    async fn load_locked(
        &self,
        position: usize,
        generation: u64,
        path: PathBuf,
        _guard: OwnedMutexGuard<()>,
    ) -> Result<(), Error> {
        // Lost the race to an earlier holder of this position's lock.
        if self.inner.cache.lock().await.contains_key(&position) {
            return Ok(());
        }
        if self.generation() != generation {
            debug!(position, "skipping load captured under a stale generation");
            return Ok(());
        }

        let bytes = self.read_uncached(&path).await?;

        let mut cache = self.inner.cache.lock().await;
        if self.generation() == generation {
            cache.insert(position, bytes);
        } else {
            debug!(position, "discarding payload loaded before a rebuild");
        }
        Ok(())
    }

    /// Read a payload through the storage reader, bypassing the cache.
    pub async fn read_uncached(&self, path: &Path) -> Result<Bytes, Error> {
        let reader = Arc::clone(&self.inner.reader);
        let read_path = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || reader.read_bytes(&read_path))
            .await
            .map_err(io::Error::other)?;
        match result {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(path.to_path_buf()))
            }
            Err(err) => Err(Error::Io(err)),
        }
    }

    /// Replace the catalog wholesale and invalidate everything loaded or in
    /// flight under the old one.
    ///
    /// Runs entirely under the catalog write lock: aborts tracked loads,
    /// clears the per-position locks, bumps the generation, wipes the
    /// cache, installs the new records. After return no load captured under
    /// a prior generation can commit.
    pub async fn rebuild(&self, records: Vec<PhotoRecord>) {
        let mut catalog = self.inner.catalog.write().await;
        {
            let mut tasks = self.inner.tasks.lock().await;
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
        self.inner.locks.lock().await.clear();
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.cache.lock().await.clear();
        *catalog = Catalog::new(records);
        debug!(generation, count = catalog.len(), "catalog swapped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    #[tokio::test]
    async fn focus_on_empty_catalog_is_a_noop() {
        let carousel = Carousel::new();
        carousel.focus(7).await.unwrap();
        assert!(carousel.payload(7).await.is_none());
        assert!(carousel.is_empty().await);
    }

    #[tokio::test]
    async fn exclude_and_like_return_snapshots() {
        let carousel = Carousel::new();
        let excluded = carousel.exclude("a.jpg".to_string()).await;
        assert!(excluded.contains("a.jpg"));
        let liked = carousel.like("b.jpg".to_string()).await;
        assert!(liked.contains("b.jpg"));
        assert!(!liked.contains("a.jpg"));
    }

    #[tokio::test]
    async fn rebuild_wipes_cached_payloads() {
        struct Fixed;
        impl StorageReader for Fixed {
            fn read_bytes(&self, _path: &Path) -> io::Result<Vec<u8>> {
                Ok(vec![1, 2, 3])
            }
        }

        let record = PhotoRecord {
            path: PathBuf::from("/p/a.jpg"),
            name: "a.jpg".to_string(),
            folder: "p".to_string(),
            file_date: Utc::now(),
            index: 0,
        };
        let carousel = Carousel::with_reader(Arc::new(Fixed));
        carousel.rebuild(vec![record.clone()]).await;
        carousel.ensure_loaded(0, LoadMode::Blocking).await.unwrap();
        assert!(carousel.payload(0).await.is_some());

        carousel.rebuild(vec![record]).await;
        assert!(carousel.payload(0).await.is_none());
    }
}
