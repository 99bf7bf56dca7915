//! Per-index reader/writer concurrency controller (spec §4.4).
//!
//! `tokio::sync::RwLock` is writer-fair by construction: once a writer is
//! queued, later `read()`/`write()` calls queue behind it rather than
//! starving it, which is exactly the write-priority discipline the spec
//! asks for. This is the simpler of the two schemes the original carries
//! (`original_source/src/luxdb/knn_store.py::ReadWriteLock`), chosen over
//! the three-state "exclusive-states" lock per spec §9's direction.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::index::IndexWrapper;

/// Owns one index's wrapper behind a reader/writer lock.
#[derive(Clone)]
pub struct IndexLock {
    inner: Arc<RwLock<IndexWrapper>>,
}

impl IndexLock {
    pub fn new(wrapper: IndexWrapper) -> Self {
        Self { inner: Arc::new(RwLock::new(wrapper)) }
    }

    /// Acquire for a read operation: `query`, `get_items`, `get_ids`,
    /// `get_max_elements`, `count`, `info`, `get_ef`, `get_ef_construction`.
    pub async fn read(&self) -> RwLockReadGuard<'_, IndexWrapper> {
        self.inner.read().await
    }

    /// Acquire for a write operation: `init`, `add`, `set_ef`, `resize`,
    /// `mark_deleted`, `save`, `load`.
    pub async fn write(&self) -> RwLockWriteGuard<'_, IndexWrapper> {
        self.inner.write().await
    }

    /// Lazily loads the snapshot at `path` into the wrapper if it is a
    /// cold wrapper reconstructed from manifest metadata alone after a
    /// store reopen (spec §4.5: "happens inside the reader critical
    /// section"). `expected_m` is the manifest's recorded `M` for this
    /// index: a no-op if the wrapper is already loaded, or the index was
    /// never initialized (`expected_m == 0`, so no snapshot file exists
    /// to load).
    pub async fn ensure_loaded(&self, path: &Path, expected_m: usize) -> std::io::Result<()> {
        {
            let guard = self.inner.read().await;
            if guard.is_loaded(expected_m) {
                return Ok(());
            }
        }

        let mut guard = self.inner.write().await;
        if guard.is_loaded(expected_m) {
            return Ok(());
        }
        let space = guard.engine().space();
        let dim = guard.engine().dim();
        let loaded = IndexWrapper::load(path, space, dim)?;
        *guard.engine_mut() = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::Space;
    use uuid::Uuid;

    fn lock() -> IndexLock {
        IndexLock::new(IndexWrapper::new(Uuid::new_v4(), Space::L2, 4))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_readers_allowed() {
        let l = lock();
        let r1 = l.read().await;
        let r2 = l.read().await;
        assert_eq!(r1.meta().dim, r2.meta().dim);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writer_excludes_other_writers() {
        let l = lock();
        {
            let mut w = l.write().await;
            w.mark_dirty();
        }
        let w2 = l.write().await;
        assert!(!w2.is_dirty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writer_waits_for_readers_to_drain() {
        let l = lock();
        let read_guard = l.read().await;
        let l2 = l.clone();
        let write_fut = tokio::spawn(async move {
            let mut w = l2.write().await;
            w.mark_dirty();
        });

        // give the writer a chance to queue behind the held reader
        tokio::task::yield_now().await;
        drop(read_guard);
        write_fut.await.unwrap();

        let w = l.read().await;
        assert!(w.is_dirty());
    }
}
