//! Index registry / store (spec §4.5): owns the name → index mapping,
//! routes each operation through the right concurrency state, and drives
//! persistence.
//!
//! Grounded on `original_source/src/luxdb/knn_store.py::KNNStore` — the
//! `_index_for_read`/`_index_for_write`/`_index_for_init` async context
//! managers become `ensure_loaded` + `IndexLock::read`/`write` here, and
//! `self.transaction.commit()` after each mutation becomes
//! `PersistenceManager::persist_manifest`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ann::{AnnError, Space};
use crate::concurrency::IndexLock;
use crate::error::{LuxError, LuxResult};
use crate::index::{IndexInfo, IndexMeta, IndexWrapper};
use crate::persistence::PersistenceManager;

fn map_ann_err(name: &str, e: AnnError) -> LuxError {
    match e {
        AnnError::AlreadyInitialized => LuxError::Internal(format!("{name}: already initialized")),
        AnnError::NotInitialized => LuxError::IndexNotInitialized(name.to_string()),
        AnnError::DimensionMismatch { expected, got } => {
            LuxError::DimensionMismatch { name: name.to_string(), expected, got }
        }
        AnnError::CapacityExceeded { would_be, max } => {
            LuxError::CapacityExceeded { name: name.to_string(), would_be, max }
        }
        AnnError::UnknownLabel(label) => LuxError::UnknownLabel { name: name.to_string(), label },
    }
}

/// The database: a registry of named ANN indexes plus the persistence
/// manager that backs it. Connections never own an index directly — they
/// borrow through `Store`.
pub struct Store {
    entries: RwLock<HashMap<String, IndexLock>>,
    manifest: Mutex<HashMap<String, IndexMeta>>,
    persistence: PersistenceManager,
}

impl Store {
    /// Opens (or creates) the store at `path`: ensures `path/indexes/`
    /// exists, loads the manifest, and reconstructs cold wrappers for
    /// every registered name (spec §4.6 "Open/close").
    pub fn open(path: &Path) -> LuxResult<Self> {
        let persistence = PersistenceManager::open(path)?;
        Self::from_persistence(persistence)
    }

    /// In-memory mode for tests (spec §4.6 "In-memory mode"): snapshots
    /// live under a temporary directory, manifest is ephemeral. The
    /// returned guard must outlive the store.
    pub fn temporary() -> LuxResult<(Self, tempfile::TempDir)> {
        let (persistence, guard) = PersistenceManager::temporary()?;
        Ok((Self::from_persistence(persistence)?, guard))
    }

    fn from_persistence(persistence: PersistenceManager) -> LuxResult<Self> {
        let manifest = persistence.load_manifest()?;
        let mut entries = HashMap::with_capacity(manifest.len());
        for (name, meta) in &manifest {
            let space = Space::parse(&meta.space).ok_or_else(|| LuxError::UnknownSpace(meta.space.clone()))?;
            let wrapper = IndexWrapper::new(meta.uuid, space, meta.dim);
            entries.insert(name.clone(), IndexLock::new(wrapper));
        }
        Ok(Self { entries: RwLock::new(entries), manifest: Mutex::new(manifest), persistence })
    }

    /// Commits any pending manifest transaction and closes the store
    /// (spec §4.8 step 5, graceful shutdown).
    pub fn close(&self) -> LuxResult<()> {
        self.persistence.close()
    }

    async fn lock_for(&self, name: &str) -> LuxResult<IndexLock> {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| LuxError::IndexDoesNotExist(name.to_string()))
    }

    /// The manifest's recorded `M` for `name`: `0` iff `init_index` has
    /// never run for it, per invariant I3. Used to decide whether a cold
    /// wrapper has a snapshot worth loading — NOT `element_count`, which
    /// is legitimately `0` for an initialized-but-empty index that still
    /// has a snapshot carrying its real `max_elements`/`ef_construction`.
    fn expected_m(&self, name: &str) -> usize {
        self.manifest.lock().unwrap().get(name).map(|m| m.m).unwrap_or(0)
    }

    async fn ensure_loaded(&self, name: &str, lock: &IndexLock, uuid: Uuid) -> LuxResult<()> {
        let expected_m = self.expected_m(name);
        lock.ensure_loaded(&self.persistence.snapshot_path(uuid), expected_m)
            .map_err(|e| LuxError::Persistence(e.to_string()))
    }

    fn record_meta(&self, name: &str, meta: IndexMeta) -> LuxResult<()> {
        let snapshot = {
            let mut manifest = self.manifest.lock().unwrap();
            manifest.insert(name.to_string(), meta);
            manifest.clone()
        };
        self.persistence.persist_manifest(&snapshot)
    }

    pub async fn index_exists(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    pub async fn get_indexes(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn create_index(&self, name: &str, space: &str, dim: usize) -> LuxResult<bool> {
        let space = Space::parse(space).ok_or_else(|| LuxError::UnknownSpace(space.to_string()))?;

        let mut entries = self.entries.write().await;
        if entries.contains_key(name) {
            return Err(LuxError::IndexAlreadyExists(name.to_string()));
        }

        let uuid = Uuid::new_v4();
        let wrapper = IndexWrapper::new(uuid, space, dim);
        let meta = wrapper.meta();
        entries.insert(name.to_string(), IndexLock::new(wrapper));
        drop(entries);

        self.record_meta(name, meta)?;
        Ok(true)
    }

    pub async fn init_index(&self, name: &str, max_elements: usize, ef_construction: usize, m: usize) -> LuxResult<()> {
        let lock = self.lock_for(name).await?;
        let mut guard = lock.write().await;

        guard.engine_mut().init(max_elements, ef_construction, m).map_err(|e| map_ann_err(name, e))?;
        guard.mark_dirty();
        guard.save(&self.persistence.snapshot_path(guard.uuid())).map_err(|e| LuxError::Persistence(e.to_string()))?;
        let meta = guard.meta();
        drop(guard);

        self.record_meta(name, meta)
    }

    pub async fn delete_index(&self, name: &str) -> LuxResult<()> {
        let mut entries = self.entries.write().await;
        let lock = entries.remove(name).ok_or_else(|| LuxError::IndexDoesNotExist(name.to_string()))?;
        let uuid = lock.read().await.uuid();
        drop(entries);

        self.persistence.remove_snapshot(uuid)?;
        let snapshot = {
            let mut manifest = self.manifest.lock().unwrap();
            manifest.remove(name);
            manifest.clone()
        };
        self.persistence.persist_manifest(&snapshot)
    }

    /// Atomic insertion of a pre-built wrapper under a new name (spec
    /// §4.5 `import_index`).
    pub async fn import_index(&self, name: &str, wrapper: IndexWrapper) -> LuxResult<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(name) {
            return Err(LuxError::IndexAlreadyExists(name.to_string()));
        }

        let uuid = wrapper.uuid();
        let meta = wrapper.meta();
        let mut wrapper = wrapper;
        wrapper
            .save(&self.persistence.snapshot_path(uuid))
            .map_err(|e| LuxError::Persistence(e.to_string()))?;
        entries.insert(name.to_string(), IndexLock::new(wrapper));
        drop(entries);

        self.record_meta(name, meta)
    }

    pub async fn add_items(&self, name: &str, data: &[Vec<f32>], ids: &[i64]) -> LuxResult<()> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;

        let mut guard = lock.write().await;
        // CPU-heavy: offload so the event loop stays responsive (spec §5).
        tokio::task::block_in_place(|| guard.engine_mut().add(data, ids)).map_err(|e| map_ann_err(name, e))?;
        guard.mark_dirty();
        guard.save(&self.persistence.snapshot_path(uuid)).map_err(|e| LuxError::Persistence(e.to_string()))?;
        let meta = guard.meta();
        drop(guard);

        self.record_meta(name, meta)
    }

    pub async fn set_ef(&self, name: &str, new_ef: usize) -> LuxResult<()> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;

        let mut guard = lock.write().await;
        guard.engine_mut().set_ef(new_ef).map_err(|e| map_ann_err(name, e))?;
        guard.mark_dirty();
        guard.save(&self.persistence.snapshot_path(uuid)).map_err(|e| LuxError::Persistence(e.to_string()))?;
        let meta = guard.meta();
        drop(guard);

        self.record_meta(name, meta)
    }

    pub async fn get_ef(&self, name: &str) -> LuxResult<usize> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        if !guard.engine().is_initialized() {
            return Err(LuxError::IndexNotInitialized(name.to_string()));
        }
        Ok(guard.engine().ef())
    }

    pub async fn get_ef_construction(&self, name: &str) -> LuxResult<usize> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        if !guard.engine().is_initialized() {
            return Err(LuxError::IndexNotInitialized(name.to_string()));
        }
        Ok(guard.engine().ef_construction())
    }

    pub async fn max_elements(&self, name: &str) -> LuxResult<usize> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        if !guard.engine().is_initialized() {
            return Err(LuxError::IndexNotInitialized(name.to_string()));
        }
        Ok(guard.engine().max_elements())
    }

    pub async fn count(&self, name: &str) -> LuxResult<usize> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        if !guard.engine().is_initialized() {
            return Err(LuxError::IndexNotInitialized(name.to_string()));
        }
        Ok(guard.engine().current_count())
    }

    pub async fn info(&self, name: &str) -> LuxResult<IndexInfo> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        if !guard.engine().is_initialized() {
            return Err(LuxError::IndexNotInitialized(name.to_string()));
        }
        Ok(guard.info())
    }

    pub async fn get_items(&self, name: &str, ids: &[i64]) -> LuxResult<Vec<Vec<f32>>> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        if guard.engine().current_count() == 0 {
            return Ok(Vec::new());
        }
        guard.engine().get_items(ids).map_err(|e| map_ann_err(name, e))
    }

    pub async fn get_ids(&self, name: &str) -> LuxResult<Vec<i64>> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        if guard.engine().current_count() == 0 {
            return Ok(Vec::new());
        }
        Ok(guard.engine().get_ids())
    }

    pub async fn query_index(&self, name: &str, vectors: &[Vec<f32>], k: usize) -> LuxResult<(Vec<Vec<i64>>, Vec<Vec<f32>>)> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;
        let guard = lock.read().await;
        // CPU-heavy: offload so the event loop stays responsive (spec §5).
        tokio::task::block_in_place(|| guard.engine().query(vectors, k)).map_err(|e| map_ann_err(name, e))
    }

    pub async fn delete_item(&self, name: &str, label: i64) -> LuxResult<()> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;

        let mut guard = lock.write().await;
        guard.engine_mut().mark_deleted(label).map_err(|e| map_ann_err(name, e))?;
        guard.mark_dirty();
        guard.save(&self.persistence.snapshot_path(uuid)).map_err(|e| LuxError::Persistence(e.to_string()))?;
        let meta = guard.meta();
        drop(guard);

        self.record_meta(name, meta)
    }

    pub async fn resize_index(&self, name: &str, new_size: usize) -> LuxResult<()> {
        let lock = self.lock_for(name).await?;
        let uuid = lock.read().await.uuid();
        self.ensure_loaded(name, &lock, uuid).await?;

        let mut guard = lock.write().await;
        // CPU-heavy: offload so the event loop stays responsive (spec §5).
        tokio::task::block_in_place(|| guard.engine_mut().resize(new_size)).map_err(|e| map_ann_err(name, e))?;
        guard.mark_dirty();
        guard.save(&self.persistence.snapshot_path(uuid)).map_err(|e| LuxError::Persistence(e.to_string()))?;
        let meta = guard.meta();
        drop(guard);

        self.record_meta(name, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (Store, tempfile::TempDir) {
        Store::temporary().unwrap()
    }

    fn rows(n: usize, dim: usize) -> (Vec<Vec<f32>>, Vec<i64>) {
        let data = (0..n).map(|i| (0..dim).map(|d| (i * dim + d) as f32).collect()).collect();
        let ids = (0..n as i64).collect();
        (data, ids)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_index_reports_space_and_dim() {
        let (store, _guard) = store().await;
        assert!(store.create_index("idx", "l2", 12).await.unwrap());
        store.init_index("idx", 100, 140, 12).await.unwrap();
        let info = store.info("idx").await.unwrap();
        assert_eq!(info.dim, 12);
        assert_eq!(info.space, "l2");
        assert_eq!(info.max_elements, 100);
        assert_eq!(info.element_count, 0);
        assert_eq!(info.ef_construction, 140);
        assert_eq!(info.m, 12);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_index_twice_fails() {
        let (store, _guard) = store().await;
        store.create_index("idx", "l2", 4).await.unwrap();
        let err = store.create_index("idx", "l2", 4).await.unwrap_err();
        assert!(matches!(err, LuxError::IndexAlreadyExists(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_space_rejected() {
        let (store, _guard) = store().await;
        let err = store.create_index("idx", "manhattan", 4).await.unwrap_err();
        assert!(matches!(err, LuxError::UnknownSpace(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uninitialized_index_rejects_operations() {
        let (store, _guard) = store().await;
        store.create_index("idx", "l2", 4).await.unwrap();
        let err = store.count("idx").await.unwrap_err();
        assert!(matches!(err, LuxError::IndexNotInitialized(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_then_query_round_trips() {
        let (store, _guard) = store().await;
        store.create_index("idx", "l2", 4).await.unwrap();
        store.init_index("idx", 100, 100, 12).await.unwrap();

        let (data, ids) = rows(20, 4);
        store.add_items("idx", &data, &ids).await.unwrap();
        assert_eq!(store.count("idx").await.unwrap(), 20);

        let got_ids: std::collections::HashSet<_> = store.get_ids("idx").await.unwrap().into_iter().collect();
        let want_ids: std::collections::HashSet<_> = ids.iter().copied().collect();
        assert!(want_ids.is_subset(&got_ids));

        let items = store.get_items("idx", &ids).await.unwrap();
        assert_eq!(items, data);

        let (labels, dists) = store.query_index("idx", &data[..5], 1).await.unwrap();
        for (row, label_row) in labels.iter().enumerate() {
            assert_eq!(label_row[0], row as i64);
            assert!(dists[row][0].abs() < 1e-3);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resize_then_max_elements_reflects_it() {
        let (store, _guard) = store().await;
        store.create_index("idx", "l2", 4).await.unwrap();
        store.init_index("idx", 100, 100, 12).await.unwrap();
        store.resize_index("idx", 200).await.unwrap();
        assert_eq!(store.max_elements("idx").await.unwrap(), 200);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_item_excludes_from_query() {
        let (store, _guard) = store().await;
        store.create_index("idx", "l2", 4).await.unwrap();
        store.init_index("idx", 100, 100, 12).await.unwrap();
        let (data, ids) = rows(5, 4);
        store.add_items("idx", &data, &ids).await.unwrap();

        store.delete_item("idx", 0).await.unwrap();
        let (labels, _) = store.query_index("idx", &data, data.len()).await.unwrap();
        for row in &labels {
            assert!(!row.contains(&0));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_indexes_reports_all_created() {
        let (store, _guard) = store().await;
        store.create_index("a", "l2", 4).await.unwrap();
        store.create_index("b", "cosine", 4).await.unwrap();
        let names: std::collections::HashSet<_> = store.get_indexes().await.into_iter().collect();
        assert_eq!(names, ["a".to_string(), "b".to_string()].into_iter().collect());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_index_then_missing_operations_fail() {
        let (store, _guard) = store().await;
        store.create_index("idx", "l2", 4).await.unwrap();
        store.delete_index("idx").await.unwrap();
        assert!(!store.index_exists("idx").await);
        let err = store.delete_index("idx").await.unwrap_err();
        assert!(matches!(err, LuxError::IndexDoesNotExist(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reopen_from_same_path_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            store.create_index("idx", "l2", 4).await.unwrap();
            store.init_index("idx", 50, 80, 10).await.unwrap();
            let (data, ids) = rows(10, 4);
            store.add_items("idx", &data, &ids).await.unwrap();
            store.close().unwrap();
        }

        let reopened = Store::open(dir.path()).unwrap();
        assert!(reopened.index_exists("idx").await);
        assert_eq!(reopened.count("idx").await.unwrap(), 10);
        let ids: std::collections::HashSet<_> = reopened.get_ids("idx").await.unwrap().into_iter().collect();
        assert_eq!(ids, (0..10i64).collect());
    }
}
