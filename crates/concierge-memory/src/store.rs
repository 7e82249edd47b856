//! Profile storage backends.
//!
//! A [`ProfileStore`] maps a client id to an opaque serialized profile.
//! Every `put` replaces the previous blob as a whole: readers observe either
//! the old or the new profile, never a partial write.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rusqlite::OptionalExtension;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use concierge_core::{ConciergeConfig, ConciergeError, Result};

use crate::db::Database;

/// Key-value storage for serialized session profiles.
pub trait ProfileStore: Send + Sync {
    /// Fetch the blob for `client_id`, or `None` if nothing was stored.
    fn get(&self, client_id: &str) -> Result<Option<Vec<u8>>>;

    /// Atomically replace the blob for `client_id`.
    fn put(&self, client_id: &str, data: &[u8]) -> Result<()>;

    /// Remove the blob for `client_id`. Missing entries are not an error.
    fn delete(&self, client_id: &str) -> Result<()>;
}

/// Build the backend selected by `memory.backend`.
pub fn open_profile_store(config: &ConciergeConfig) -> Result<Arc<dyn ProfileStore>> {
    match config.memory.backend.as_str() {
        "file" => Ok(Arc::new(FileProfileStore::new(&config.memory.storage_dir)?)),
        "sqlite" => {
            let path = Path::new(&config.general.data_dir).join("profiles.db");
            Ok(Arc::new(SqliteProfileStore::open(&path)?))
        }
        other => Err(ConciergeError::Config(format!(
            "Unknown memory backend '{}', expected \"file\" or \"sqlite\"",
            other
        ))),
    }
}

// =============================================================================
// File backend
// =============================================================================

/// One JSON file per client, named after a hash of the client id.
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    /// Use `dir` for profile files, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!("Profile files stored in {}", dir.display());
        Ok(Self { dir })
    }

    /// `memory_<first 16 hex chars of sha256(client_id)>.json`
    pub fn file_name(client_id: &str) -> String {
        let digest = format!("{:x}", Sha256::digest(client_id.as_bytes()));
        format!("memory_{}.json", &digest[..16])
    }

    pub fn path_for(&self, client_id: &str) -> PathBuf {
        self.dir.join(Self::file_name(client_id))
    }
}

impl ProfileStore for FileProfileStore {
    fn get(&self, client_id: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(client_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, client_id: &str, data: &[u8]) -> Result<()> {
        let target = self.path_for(client_id);
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            Self::file_name(client_id),
            uuid::Uuid::new_v4().simple()
        ));

        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
            std::fs::rename(&tmp, &target)
        };

        if let Err(e) = write() {
            let _ = std::fs::remove_file(&tmp);
            return Err(ConciergeError::Storage(format!(
                "Failed to write {}: {}",
                target.display(),
                e
            )));
        }

        debug!(path = %target.display(), bytes = data.len(), "Profile written");
        Ok(())
    }

    fn delete(&self, client_id: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(client_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// SQLite backend
// =============================================================================

/// Profiles stored as rows of the `profiles` table.
#[derive(Debug)]
pub struct SqliteProfileStore {
    db: Database,
}

impl SqliteProfileStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: Database::new(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: Database::in_memory()?,
        })
    }
}

impl ProfileStore for SqliteProfileStore {
    fn get(&self, client_id: &str) -> Result<Option<Vec<u8>>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT data FROM profiles WHERE client_id = ?1",
                rusqlite::params![client_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(|e| ConciergeError::Storage(format!("Failed to read profile: {}", e)))
        })
    }

    fn put(&self, client_id: &str, data: &[u8]) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (client_id, data, updated_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))
                 ON CONFLICT(client_id) DO UPDATE SET
                    data = excluded.data,
                    updated_at = excluded.updated_at",
                rusqlite::params![client_id, data],
            )
            .map_err(|e| ConciergeError::Storage(format!("Failed to save profile: {}", e)))?;
            Ok(())
        })
    }

    fn delete(&self, client_id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM profiles WHERE client_id = ?1",
                rusqlite::params![client_id],
            )
            .map_err(|e| ConciergeError::Storage(format!("Failed to delete profile: {}", e)))?;
            Ok(())
        })
    }
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Process-local store, mainly for tests.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn get(&self, client_id: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| ConciergeError::Storage(format!("Lock poisoned: {}", e)))?;
        Ok(blobs.get(client_id).cloned())
    }

    fn put(&self, client_id: &str, data: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| ConciergeError::Storage(format!("Lock poisoned: {}", e)))?;
        blobs.insert(client_id.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, client_id: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| ConciergeError::Storage(format!("Lock poisoned: {}", e)))?;
        blobs.remove(client_id);
        Ok(())
    }
}
