//! # Schema Migration
//!
//! The store schema evolves through an ordered sequence of steps, one per
//! version. [`migrate`] runs every step between the persisted version and the
//! target inside a single exclusive transaction, bumping the persisted version
//! after each step in that same transaction:
//!
//! ```text
//!   BEGIN EXCLUSIVE
//!     read version (0 if unset)          ── current
//!     step(current+1); version = current+1
//!     step(current+2); version = current+2
//!     ...
//!   COMMIT                               ── only if every step succeeded
//! ```
//!
//! A failing step drops the transaction, so the database is left exactly at
//! the version it had before the call.
//!
//! ## Rebuild-and-swap
//!
//! SQLite cannot add columns with computed defaults or rename columns across
//! all supported versions, so most steps rebuild `aciinfo`: create a shadow
//! table with the new shape, copy the mapped columns (unmapped columns take
//! the zero value from their `DEFAULT`), drop the old table, rename the shadow
//! into place and recreate the indices.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info};

/// A single migration step. Runs inside the enclosing transaction.
pub type MigrationStep = fn(&Connection) -> rusqlite::Result<()>;

/// Append-only, ordered registry of migration steps.
///
/// Versions must be registered contiguously starting at the registry's
/// floor, so a registry can never contain gaps. A database older than the
/// floor cannot be migrated by this registry and fails with
/// [`Error::MissingMigration`].
#[derive(Clone)]
pub struct MigrationRegistry {
    floor: u32,
    steps: Vec<(u32, MigrationStep)>,
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("floor", &self.floor)
            .field("highest", &self.highest())
            .finish()
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRegistry {
    /// Creates an empty registry whose first step migrates to version 1.
    pub fn new() -> Self {
        Self {
            floor: 1,
            steps: Vec::new(),
        }
    }

    /// Creates an empty registry whose first step migrates to `floor`.
    pub fn with_floor(floor: u32) -> Result<Self> {
        if floor == 0 {
            return Err(Error::InvalidMigrationRegistry(
                "floor version must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            floor,
            steps: Vec::new(),
        })
    }

    /// Registers the step migrating to `version`.
    ///
    /// `version` must be exactly one past the last registered version (or the
    /// floor for the first step).
    pub fn register(mut self, version: u32, step: MigrationStep) -> Result<Self> {
        let expected = self.steps.last().map_or(self.floor, |(v, _)| v + 1);
        if version != expected {
            return Err(Error::InvalidMigrationRegistry(format!(
                "version {} registered out of order, expected {}",
                version, expected
            )));
        }
        self.steps.push((version, step));
        Ok(self)
    }

    /// The steps shipped with this binary, versions 1 through
    /// [`crate::constants::DB_VERSION`].
    pub fn builtin() -> Result<Self> {
        Self::new()
            .register(1, migrate_to_v1)?
            .register(2, migrate_to_v2)?
            .register(3, migrate_to_v3)?
            .register(4, migrate_to_v4)?
            .register(5, migrate_to_v5)?
            .register(6, migrate_to_v6)
    }

    /// Highest version reachable through this registry.
    pub fn highest(&self) -> u32 {
        self.steps.last().map_or(self.floor - 1, |(v, _)| *v)
    }

    /// Returns the step migrating to `version`.
    pub fn step(&self, version: u32) -> Option<MigrationStep> {
        self.steps
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, step)| *step)
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps.iter().map(|(v, _)| *v)
    }
}

// =============================================================================
// Version Table
// =============================================================================

const CREATE_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS version (version INTEGER NOT NULL)";

fn version_table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'version'",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

/// Reads the persisted schema version (0 for a fresh database).
pub fn schema_version(conn: &Connection) -> Result<u32> {
    if !version_table_exists(conn)? {
        return Ok(0);
    }
    let version = conn
        .query_row("SELECT version FROM version LIMIT 1", [], |row| {
            row.get::<_, u32>(0)
        })
        .optional()?;
    Ok(version.unwrap_or(0))
}

fn update_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM version", [])?;
    conn.execute("INSERT INTO version (version) VALUES (?1)", params![version])?;
    Ok(())
}

// =============================================================================
// Migration Driver
// =============================================================================

/// Migrates the database to `target`, returning the resulting version.
///
/// Fails with [`Error::UnsupportedSchemaVersion`] before touching the
/// database if `target` is beyond the registry. Targets at or below the
/// current version are a no-op; schemas are never downgraded.
pub fn migrate(conn: &mut Connection, registry: &MigrationRegistry, target: u32) -> Result<u32> {
    if target > registry.highest() {
        return Err(Error::UnsupportedSchemaVersion {
            requested: target,
            supported: registry.highest(),
        });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
    tx.execute_batch(CREATE_VERSION_TABLE)?;
    let current = schema_version(&tx)?;

    if current > registry.highest() {
        return Err(Error::UnsupportedSchemaVersion {
            requested: current,
            supported: registry.highest(),
        });
    }

    if current >= target {
        debug!("Store schema at version {}, nothing to migrate", current);
        tx.commit()?;
        return Ok(current);
    }

    for version in current + 1..=target {
        let step = registry
            .step(version)
            .ok_or(Error::MissingMigration(version))?;
        step(&tx)
            .and_then(|()| update_schema_version(&tx, version))
            .map_err(|source| Error::MigrationFailed { version, source })?;
        debug!("Applied store migration to version {}", version);
    }

    tx.commit()?;
    info!("Migrated store schema from version {} to {}", current, target);
    Ok(target)
}

// =============================================================================
// Built-in Steps
// =============================================================================

/// Shadow-table rebuild of `aciinfo`.
struct AciInfoRebuild {
    /// Column definitions of the new shape.
    shape: &'static str,
    /// Columns of the new shape filled from the old table.
    copy_into: &'static str,
    /// Matching expressions over the old table.
    copy_from: &'static str,
}

impl AciInfoRebuild {
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE aciinfo_tmp ({shape});
             INSERT INTO aciinfo_tmp ({into}) SELECT {from} FROM aciinfo;
             DROP TABLE aciinfo;
             ALTER TABLE aciinfo_tmp RENAME TO aciinfo;
             CREATE UNIQUE INDEX IF NOT EXISTS blobkeyidx ON aciinfo (blobkey);
             CREATE INDEX IF NOT EXISTS nameidx ON aciinfo (name);",
            shape = self.shape,
            into = self.copy_into,
            from = self.copy_from,
        ))
    }
}

/// Base tables.
fn migrate_to_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS aciinfo (
             blobkey TEXT NOT NULL,
             appname TEXT NOT NULL DEFAULT '',
             importtime INTEGER NOT NULL DEFAULT 0,
             latest INTEGER NOT NULL DEFAULT 0
         );
         CREATE UNIQUE INDEX IF NOT EXISTS blobkeyidx ON aciinfo (blobkey);
         CREATE INDEX IF NOT EXISTS appnameidx ON aciinfo (appname);
         CREATE TABLE IF NOT EXISTS remote (
             aciurl TEXT NOT NULL,
             etag TEXT NOT NULL DEFAULT '',
             blobkey TEXT NOT NULL DEFAULT ''
         );
         CREATE UNIQUE INDEX IF NOT EXISTS aciurlidx ON remote (aciurl);",
    )
}

/// Cache control columns on `remote`, added in place.
fn migrate_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "ALTER TABLE remote ADD COLUMN cachemaxage INTEGER;
         ALTER TABLE remote ADD COLUMN downloadedtime INTEGER;
         UPDATE remote SET cachemaxage = 0, downloadedtime = 0;",
    )
}

/// `appname` becomes `name`.
fn migrate_to_v3(conn: &Connection) -> rusqlite::Result<()> {
    AciInfoRebuild {
        shape: "blobkey TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                importtime INTEGER NOT NULL DEFAULT 0,
                latest INTEGER NOT NULL DEFAULT 0",
        copy_into: "blobkey, name, importtime, latest",
        copy_from: "blobkey, appname, importtime, latest",
    }
    .apply(conn)
}

/// Adds `lastusedtime`, backfilled with the migration time.
fn migrate_to_v4(conn: &Connection) -> rusqlite::Result<()> {
    AciInfoRebuild {
        shape: "blobkey TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                importtime INTEGER NOT NULL DEFAULT 0,
                lastusedtime INTEGER NOT NULL DEFAULT 0,
                latest INTEGER NOT NULL DEFAULT 0",
        copy_into: "blobkey, name, importtime, latest",
        copy_from: "blobkey, name, importtime, latest",
    }
    .apply(conn)?;
    let now = chrono::Utc::now().timestamp();
    conn.execute("UPDATE aciinfo SET lastusedtime = ?1", params![now])?;
    Ok(())
}

/// `lastusedtime` becomes `lastused`; adds blob and tree store sizes.
fn migrate_to_v5(conn: &Connection) -> rusqlite::Result<()> {
    AciInfoRebuild {
        shape: "blobkey TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                importtime INTEGER NOT NULL DEFAULT 0,
                lastused INTEGER NOT NULL DEFAULT 0,
                latest INTEGER NOT NULL DEFAULT 0,
                size INTEGER NOT NULL DEFAULT 0,
                treestoresize INTEGER NOT NULL DEFAULT 0",
        copy_into: "blobkey, name, importtime, lastused, latest",
        copy_from: "blobkey, name, importtime, lastusedtime, latest",
    }
    .apply(conn)
}

/// Adds fetch provenance: verification hash, source URL, insecure options.
fn migrate_to_v6(conn: &Connection) -> rusqlite::Result<()> {
    AciInfoRebuild {
        shape: "blobkey TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                importtime INTEGER NOT NULL DEFAULT 0,
                lastused INTEGER NOT NULL DEFAULT 0,
                latest INTEGER NOT NULL DEFAULT 0,
                size INTEGER NOT NULL DEFAULT 0,
                treestoresize INTEGER NOT NULL DEFAULT 0,
                verificationhash TEXT NOT NULL DEFAULT '',
                sourceurl TEXT NOT NULL DEFAULT '',
                insecureoptions TEXT NOT NULL DEFAULT ''",
        copy_into: "blobkey, name, importtime, lastused, latest, size, treestoresize",
        copy_from: "blobkey, name, importtime, lastused, latest, size, treestoresize",
    }
    .apply(conn)
}
