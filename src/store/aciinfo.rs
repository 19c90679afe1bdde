//! Image blob records (`aciinfo` table, schema version 6).

use super::keys::BlobKey;
use crate::constants::{BLOB_KEY_PREFIX, MIN_BLOB_KEY_PREFIX_LEN};
use crate::error::{Error, Result};
use crate::secflags::SecFlags;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Metadata of one stored image blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AciInfo {
    /// Content key, unique across the store.
    pub blob_key: BlobKey,
    /// Image name (e.g. `example.com/web`).
    pub name: String,
    /// When the blob was imported.
    pub import_time: DateTime<Utc>,
    /// When the blob was last used to prepare a pod.
    pub last_used: DateTime<Utc>,
    /// Whether this blob is the latest of its name.
    pub latest: bool,
    /// Compressed blob size in bytes.
    pub size: i64,
    /// Rendered tree size in bytes (0 if never rendered).
    pub tree_store_size: i64,
    /// Hash the blob was verified against at fetch time.
    pub verification_hash: String,
    /// Where the blob was fetched from.
    pub source_url: String,
    /// Insecure options in effect when the blob was fetched.
    pub insecure_options: SecFlags,
}

impl AciInfo {
    /// Creates a record imported now, with no provenance.
    pub fn new(blob_key: BlobKey, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            blob_key,
            name: name.into(),
            import_time: now,
            last_used: now,
            latest: false,
            size: 0,
            tree_store_size: 0,
            verification_hash: String::new(),
            source_url: String::new(),
            insecure_options: SecFlags::NONE,
        }
    }
}

const SELECT_COLUMNS: &str = "blobkey, name, importtime, lastused, latest, size, treestoresize, \
     verificationhash, sourceurl, insecureoptions";

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<AciInfo> {
    let key: String = row.get(0)?;
    let blob_key = BlobKey::parse(&key).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let options: String = row.get(9)?;
    // Rows migrated from schema versions before 6 carry an empty string.
    let insecure_options = if options.is_empty() {
        SecFlags::NONE
    } else {
        SecFlags::parse(&options).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?
    };
    Ok(AciInfo {
        blob_key,
        name: row.get(1)?,
        import_time: from_unix(row.get(2)?),
        last_used: from_unix(row.get(3)?),
        latest: row.get(4)?,
        size: row.get(5)?,
        tree_store_size: row.get(6)?,
        verification_hash: row.get(7)?,
        source_url: row.get(8)?,
        insecure_options,
    })
}

/// Inserts or replaces the record with the same blob key.
pub(crate) fn write(conn: &Connection, info: &AciInfo) -> Result<()> {
    conn.execute(
        "INSERT INTO aciinfo (blobkey, name, importtime, lastused, latest, size, treestoresize,
                              verificationhash, sourceurl, insecureoptions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(blobkey) DO UPDATE SET
             name = excluded.name,
             importtime = excluded.importtime,
             lastused = excluded.lastused,
             latest = excluded.latest,
             size = excluded.size,
             treestoresize = excluded.treestoresize,
             verificationhash = excluded.verificationhash,
             sourceurl = excluded.sourceurl,
             insecureoptions = excluded.insecureoptions",
        params![
            info.blob_key.as_str(),
            info.name,
            info.import_time.timestamp(),
            info.last_used.timestamp(),
            info.latest,
            info.size,
            info.tree_store_size,
            info.verification_hash,
            info.source_url,
            info.insecure_options.option_names().join(","),
        ],
    )?;
    Ok(())
}

pub(crate) fn get(conn: &Connection, key: &BlobKey) -> Result<Option<AciInfo>> {
    let info = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM aciinfo WHERE blobkey = ?1"),
            params![key.as_str()],
            from_row,
        )
        .optional()?;
    Ok(info)
}

/// Records with `name`, most recently imported first.
pub(crate) fn with_name(conn: &Connection, name: &str) -> Result<Vec<AciInfo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM aciinfo WHERE name = ?1 ORDER BY importtime DESC, blobkey"
    ))?;
    let rows = stmt.query_map(params![name], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn all(conn: &Connection) -> Result<Vec<AciInfo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM aciinfo ORDER BY name, importtime DESC"
    ))?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn update_last_used(conn: &Connection, key: &BlobKey, time: DateTime<Utc>) -> Result<()> {
    let updated = conn.execute(
        "UPDATE aciinfo SET lastused = ?1 WHERE blobkey = ?2",
        params![time.timestamp(), key.as_str()],
    )?;
    if updated == 0 {
        return Err(Error::BlobNotFound(key.to_string()));
    }
    Ok(())
}

pub(crate) fn remove(conn: &Connection, key: &BlobKey) -> Result<()> {
    let removed = conn.execute("DELETE FROM aciinfo WHERE blobkey = ?1", params![key.as_str()])?;
    if removed == 0 {
        return Err(Error::BlobNotFound(key.to_string()));
    }
    Ok(())
}

/// Expands an unambiguous key prefix to the full key.
pub(crate) fn resolve_key(conn: &Connection, prefix: &str) -> Result<BlobKey> {
    if !prefix.starts_with(BLOB_KEY_PREFIX) {
        return Err(Error::InvalidKey {
            key: prefix.to_string(),
            reason: format!("missing '{}' prefix", BLOB_KEY_PREFIX),
        });
    }
    if prefix.len() < MIN_BLOB_KEY_PREFIX_LEN {
        return Err(Error::InvalidKey {
            key: prefix.to_string(),
            reason: format!("prefix shorter than {} characters", MIN_BLOB_KEY_PREFIX_LEN),
        });
    }
    let prefix = prefix.to_ascii_lowercase();

    let mut stmt = conn.prepare(
        "SELECT blobkey FROM aciinfo WHERE substr(blobkey, 1, length(?1)) = ?1 LIMIT 2",
    )?;
    let keys = stmt
        .query_map(params![prefix], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    match keys.as_slice() {
        [] => Err(Error::BlobNotFound(prefix)),
        [key] => BlobKey::parse(key),
        _ => {
            let count = conn.query_row(
                "SELECT count(*) FROM aciinfo WHERE substr(blobkey, 1, length(?1)) = ?1",
                params![prefix],
                |row| row.get::<_, i64>(0),
            )?;
            Err(Error::AmbiguousBlobKey {
                prefix,
                count: count as usize,
            })
        }
    }
}
