//! Persistence manager: transactional manifest + per-index snapshot directory.
//!
//! Storage layout (spec §4.6):
//!
//! ```text
//! P/                   manifest store (sled database)
//! P/indexes/           per-index snapshot directory, mode 0700
//! P/indexes/<uuid>.bin opaque ANN payload
//! ```
//!
//! Grounded on `original_source/src/luxdb/knn_store.py`'s ZODB-backed
//! revision (`FileStorage` + `transaction.TransactionManager`): `sled`
//! fills the same role here — an embedded, crash-consistent, transactional
//! key-value store — and is the teacher's own storage dependency.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::LuxError;
use crate::index::IndexMeta;

const MANIFEST_KEY: &[u8] = b"registry";

pub struct PersistenceManager {
    db: sled::Db,
    indexes_dir: PathBuf,
}

impl PersistenceManager {
    /// Opens (or creates) the manifest store at `path`, ensuring
    /// `path/indexes/` exists with mode 0700.
    pub fn open(path: &Path) -> Result<Self, LuxError> {
        let db = sled::open(path).map_err(|e| LuxError::Persistence(e.to_string()))?;
        let indexes_dir = path.join("indexes");
        ensure_private_dir(&indexes_dir).map_err(|e| LuxError::Persistence(e.to_string()))?;
        Ok(Self { db, indexes_dir })
    }

    /// Ephemeral, in-memory mode: used for tests (spec §4.6, "In-memory mode").
    pub fn temporary() -> Result<(Self, tempfile::TempDir), LuxError> {
        let dir = tempfile::tempdir().map_err(|e| LuxError::Persistence(e.to_string()))?;
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| LuxError::Persistence(e.to_string()))?;
        let indexes_dir = dir.path().join("indexes");
        ensure_private_dir(&indexes_dir).map_err(|e| LuxError::Persistence(e.to_string()))?;
        Ok((Self { db, indexes_dir }, dir))
    }

    pub fn indexes_dir(&self) -> &Path {
        &self.indexes_dir
    }

    pub fn snapshot_path(&self, uuid: Uuid) -> PathBuf {
        self.indexes_dir.join(format!("{uuid}.bin"))
    }

    /// Loads the registry metadata map, empty if the store was just created.
    pub fn load_manifest(&self) -> Result<HashMap<String, IndexMeta>, LuxError> {
        match self.db.get(MANIFEST_KEY).map_err(|e| LuxError::Persistence(e.to_string()))? {
            Some(bytes) => {
                bincode::deserialize(&bytes).map_err(|e| LuxError::Persistence(e.to_string()))
            }
            None => Ok(HashMap::new()),
        }
    }

    /// Commits the full registry metadata map as one manifest transaction.
    pub fn persist_manifest(&self, registry: &HashMap<String, IndexMeta>) -> Result<(), LuxError> {
        let bytes = bincode::serialize(registry).map_err(|e| LuxError::Persistence(e.to_string()))?;
        self.db
            .insert(MANIFEST_KEY, bytes)
            .map_err(|e| LuxError::Persistence(e.to_string()))?;
        self.db.flush().map_err(|e| LuxError::Persistence(e.to_string()))?;
        Ok(())
    }

    pub fn remove_snapshot(&self, uuid: Uuid) -> Result<(), LuxError> {
        let path = self.snapshot_path(uuid);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LuxError::Persistence(e.to_string())),
        }
    }

    /// Commits any pending manifest transaction and closes the store.
    pub fn close(&self) -> Result<(), LuxError> {
        self.db.flush().map_err(|e| LuxError::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[cfg(unix)]
fn ensure_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::create_dir_all(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn ensure_private_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}
