//! Per-index wrapper: identity, static parameters, dirty flag, snapshot I/O.
//!
//! Mirrors `original_source/src/luxdb/index.py`'s `Index` class, which wraps
//! one hnswlib index plus bookkeeping the raw ANN engine doesn't carry
//! itself (UUID identity, a dirty flag, save/load against a directory).

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ann::{AnnError, AnnIndex, Space};

/// A snapshot of an index's metadata, as stored in the root manifest
/// (spec §3, "Persistent Root Manifest"). Does NOT include the opaque ANN
/// payload — that lives in `<uuid>.bin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub uuid: Uuid,
    pub space: String,
    pub dim: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub ef: usize,
    pub max_elements: usize,
    pub element_count: usize,
}

/// Everything returned by `Store::info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub space: String,
    pub dim: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub ef: usize,
    pub max_elements: usize,
    pub element_count: usize,
}

/// One entry in the registry: stable identity plus the (possibly cold)
/// in-memory ANN payload.
pub struct IndexWrapper {
    uuid: Uuid,
    engine: AnnIndex,
    dirty: bool,
}

impl IndexWrapper {
    pub fn new(uuid: Uuid, space: Space, dim: usize) -> Self {
        Self { uuid, engine: AnnIndex::new(space, dim), dirty: false }
    }

    pub fn from_engine(uuid: Uuid, engine: AnnIndex) -> Self {
        Self { uuid, engine, dirty: false }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn engine(&self) -> &AnnIndex {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AnnIndex {
        &mut self.engine
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn meta(&self) -> IndexMeta {
        IndexMeta {
            uuid: self.uuid,
            space: self.engine.space().as_str().to_string(),
            dim: self.engine.dim(),
            m: self.engine.m(),
            ef_construction: self.engine.ef_construction(),
            ef: self.engine.ef(),
            max_elements: self.engine.max_elements(),
            element_count: self.engine.current_count(),
        }
    }

    pub fn info(&self) -> IndexInfo {
        let meta = self.meta();
        IndexInfo {
            space: meta.space,
            dim: meta.dim,
            m: meta.m,
            ef_construction: meta.ef_construction,
            ef: meta.ef,
            max_elements: meta.max_elements,
            element_count: meta.element_count,
        }
    }

    /// Whether the in-memory ANN payload is present, or this is a cold
    /// wrapper reconstructed from manifest metadata alone after reopen.
    /// `expected_m` is the manifest's recorded `M` for this index: `0`
    /// means the index was never initialized, so there is no snapshot
    /// file to load and a bare wrapper already reflects reality. `M > 0`
    /// means `init_index` ran (and wrote a snapshot, spec §4.5) even if
    /// `element_count == 0` — the snapshot still carries the real
    /// `max_elements`/`ef_construction`/`ef` that a freshly-`new`'d
    /// wrapper does not, so it must be loaded regardless of element count.
    pub fn is_loaded(&self, expected_m: usize) -> bool {
        self.engine.is_initialized() || expected_m == 0
    }

    pub fn save(&mut self, path: &Path) -> std::io::Result<()> {
        self.engine.save(path)?;
        self.dirty = false;
        Ok(())
    }

    pub fn load(path: &Path, space: Space, dim: usize) -> std::io::Result<AnnIndex> {
        let loaded = AnnIndex::load(path)?;
        debug_assert_eq!(loaded.space(), space);
        debug_assert_eq!(loaded.dim(), dim);
        Ok(loaded)
    }
}

impl From<AnnError> for crate::error::LuxError {
    fn from(e: AnnError) -> Self {
        match e {
            AnnError::AlreadyInitialized => crate::error::LuxError::Internal("already initialized".into()),
            AnnError::NotInitialized => crate::error::LuxError::IndexNotInitialized(String::new()),
            AnnError::DimensionMismatch { expected, got } => {
                crate::error::LuxError::DimensionMismatch { name: String::new(), expected, got }
            }
            AnnError::CapacityExceeded { would_be, max } => {
                crate::error::LuxError::CapacityExceeded { name: String::new(), would_be, max }
            }
            AnnError::UnknownLabel(label) => {
                crate::error::LuxError::UnknownLabel { name: String::new(), label }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_wrapper_reports_uninitialized_meta() {
        let w = IndexWrapper::new(Uuid::new_v4(), Space::L2, 8);
        let meta = w.meta();
        assert_eq!(meta.m, 0);
        assert_eq!(meta.dim, 8);
        assert_eq!(meta.space, "l2");
        assert!(!w.is_dirty());
    }

    #[test]
    fn dirty_flag_tracks_mutation() {
        let mut w = IndexWrapper::new(Uuid::new_v4(), Space::L2, 4);
        w.engine_mut().init(10, 50, 8).unwrap();
        w.mark_dirty();
        assert!(w.is_dirty());
        w.clear_dirty();
        assert!(!w.is_dirty());
    }
}
