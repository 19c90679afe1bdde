//! # Content-Addressed Image Store
//!
//! Persists image blob metadata in SQLite and locates rendered filesystems
//! in the tree store.
//!
//! ## Storage Model
//!
//! ```text
//! <data_dir>/cas/
//! ├── db/
//! │   └── store.sqlite        (aciinfo, remote, version)
//! └── tree/
//!     └── <tree store id>/
//!         └── rootfs/         (rendered filesystem)
//! ```
//!
//! Opening a store migrates its schema to [`DB_VERSION`] before anything
//! else can read it. A store that failed to migrate is never returned, so no
//! caller can observe a partially migrated schema.
//!
//! ## Example
//!
//! ```rust,ignore
//! use magikpod::store::{Store, TreeStoreId};
//!
//! let store = Store::open("/var/lib/magikpod")?;
//! let id = TreeStoreId::parse("deps-sha512-...")?;
//! let rootfs = store.tree_store_rootfs(&id);
//! ```

mod aciinfo;
mod keys;
pub mod migrate;

pub use aciinfo::AciInfo;
pub use keys::{BlobKey, TreeStoreId};
pub use migrate::{MigrationRegistry, MigrationStep};

use crate::constants::{
    DB_VERSION, STORE_BUSY_TIMEOUT, STORE_DB_DIR, STORE_DB_FILE, STORE_DIR, TREE_ROOTFS_DIR,
    TREE_STORE_DIR,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Image metadata store backed by SQLite.
///
/// ## Concurrency
///
/// Each operator command opens its own `Store`. Cross-process consistency
/// comes from SQLite transactions; a migration holds the database
/// exclusively for its duration and other openers wait up to
/// [`STORE_BUSY_TIMEOUT`].
pub struct Store {
    /// Store root (`<data_dir>/cas`).
    root: PathBuf,
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("root", &self.root).finish()
    }
}

impl Store {
    /// Opens (creating if absent) the store under `data_dir` and migrates it
    /// to the current schema.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let registry = MigrationRegistry::builtin()?;
        Self::open_with(data_dir, &registry, DB_VERSION)
    }

    /// Opens the store, migrating with `registry` up to `target`.
    pub fn open_with(
        data_dir: impl AsRef<Path>,
        registry: &MigrationRegistry,
        target: u32,
    ) -> Result<Self> {
        let root = data_dir.as_ref().join(STORE_DIR);
        let db_dir = root.join(STORE_DB_DIR);

        for dir in [&db_dir, &root.join(TREE_STORE_DIR)] {
            fs::create_dir_all(dir).map_err(|e| Error::StoreUnavailable {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        }

        let db_path = db_dir.join(STORE_DB_FILE);
        let unavailable = |e: rusqlite::Error| Error::StoreUnavailable {
            path: db_path.clone(),
            reason: e.to_string(),
        };
        let mut conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(unavailable)?;
        conn.busy_timeout(STORE_BUSY_TIMEOUT).map_err(unavailable)?;

        let version = migrate::migrate(&mut conn, registry, target).map_err(|e| match e {
            Error::Database(e) if matches!(e, rusqlite::Error::SqliteFailure(..)) => {
                unavailable(e)
            }
            other => other,
        })?;

        info!(
            "Store opened at {} (schema version {})",
            root.display(),
            version
        );
        Ok(Self { root, conn })
    }

    /// Returns the store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the SQLite database path.
    pub fn db_path(&self) -> PathBuf {
        self.root.join(STORE_DB_DIR).join(STORE_DB_FILE)
    }

    /// Persisted schema version.
    pub fn schema_version(&self) -> Result<u32> {
        migrate::schema_version(&self.conn)
    }

    // =========================================================================
    // Tree Store
    // =========================================================================

    /// Directory of a rendered tree. Existence is not checked.
    pub fn tree_store_path(&self, id: &TreeStoreId) -> PathBuf {
        self.root.join(TREE_STORE_DIR).join(id.as_str())
    }

    /// Root filesystem of a rendered tree. Existence is not checked.
    pub fn tree_store_rootfs(&self, id: &TreeStoreId) -> PathBuf {
        let path = self.tree_store_path(id).join(TREE_ROOTFS_DIR);
        debug!("Tree store {} rootfs at {}", id, path.display());
        path
    }

    // =========================================================================
    // Image Records
    // =========================================================================

    /// Inserts or replaces an image record.
    pub fn write_aci_info(&self, info: &AciInfo) -> Result<()> {
        aciinfo::write(&self.conn, info)
    }

    /// Looks up the record of a content key.
    pub fn get_aci_info(&self, key: &BlobKey) -> Result<Option<AciInfo>> {
        aciinfo::get(&self.conn, key)
    }

    /// Records sharing an image name, newest import first.
    pub fn get_aci_infos_with_name(&self, name: &str) -> Result<Vec<AciInfo>> {
        aciinfo::with_name(&self.conn, name)
    }

    /// All records, grouped by name.
    pub fn all_aci_infos(&self) -> Result<Vec<AciInfo>> {
        aciinfo::all(&self.conn)
    }

    /// Marks an image as used at `time`.
    pub fn update_last_used(&self, key: &BlobKey, time: DateTime<Utc>) -> Result<()> {
        aciinfo::update_last_used(&self.conn, key, time)
    }

    /// Removes an image record.
    pub fn remove_aci_info(&self, key: &BlobKey) -> Result<()> {
        aciinfo::remove(&self.conn, key)
    }

    /// Expands an unambiguous content key prefix (e.g. `sha512-a1b2c3`).
    pub fn resolve_key(&self, prefix: &str) -> Result<BlobKey> {
        aciinfo::resolve_key(&self.conn, prefix)
    }
}
