//! Error types for the pod control plane.

use std::path::PathBuf;

/// Result type alias for control plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the pod control plane.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Identifier Resolution Errors
    // =========================================================================
    /// No pod matches the identifier.
    #[error("pod not found: {0}")]
    PodNotFound(String),

    /// A UUID prefix matches more than one pod.
    #[error("ambiguous pod identifier '{prefix}': matches {}", matches.join(", "))]
    AmbiguousPodId {
        prefix: String,
        matches: Vec<String>,
    },

    /// Pod identifier is empty or not a UUID (prefix).
    #[error("invalid pod identifier '{id}': {reason}")]
    InvalidPodId { id: String, reason: String },

    /// App is not part of the pod manifest.
    #[error("app '{app}' not found in pod {pod}")]
    AppNotFound { pod: String, app: String },

    /// No app name given and the pod has more than one app.
    #[error("pod {pod} has multiple apps ({}), specify one with --app", apps.join(", "))]
    AmbiguousApp { pod: String, apps: Vec<String> },

    /// Pod manifest lists no apps.
    #[error("pod {0} contains zero apps")]
    NoApps(String),

    /// App name is not a valid AC name.
    #[error("invalid app name '{name}': {reason}")]
    InvalidAppName { name: String, reason: String },

    /// No image record matches the key.
    #[error("image not found: {0}")]
    BlobNotFound(String),

    /// A blob key prefix matches more than one image.
    #[error("ambiguous image key '{prefix}': matches {count} images")]
    AmbiguousBlobKey { prefix: String, count: usize },

    /// Content key or tree store ID is malformed.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    // =========================================================================
    // Lifecycle State Errors
    // =========================================================================
    /// Pod is in the wrong state for the operation.
    #[error("pod {pod} is in state '{state}', expected '{expected}'")]
    InvalidState {
        pod: String,
        state: String,
        expected: String,
    },

    /// Pod's PID 1 cannot be determined.
    #[error("unable to determine the pid for pod {pod}: {reason}")]
    NoSuchProcess { pod: String, reason: String },

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Directory lock could not be taken or released.
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest file could not be parsed.
    #[error("invalid manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    /// Store could not be opened.
    #[error("store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    // =========================================================================
    // Schema Errors
    // =========================================================================
    /// No migration step registered for a version on the path.
    #[error("missing migration step for schema version {0}")]
    MissingMigration(u32),

    /// A migration step failed; nothing was committed.
    #[error("failed to migrate store schema to version {version}: {source}")]
    MigrationFailed {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// Requested or persisted schema version is newer than this binary.
    #[error("unsupported schema version {requested} (highest supported: {supported})")]
    UnsupportedSchemaVersion { requested: u32, supported: u32 },

    /// Migration registry violates ordering rules.
    #[error("invalid migration registry: {0}")]
    InvalidMigrationRegistry(String),

    // =========================================================================
    // Execution Errors
    // =========================================================================
    /// Pod directory is missing or not a directory.
    #[error("pod directory {path} unavailable: {reason}")]
    DirectoryUnavailable { path: PathBuf, reason: String },

    /// Namespace entry invocation could not be started.
    #[error("failed to start '{command}': {reason}")]
    ExecutionFailed { command: String, reason: String },

    /// An intermediate invocation exited unsuccessfully.
    #[error("'{command}' exited unsuccessfully: {status}")]
    CommandFailed { command: String, status: String },

    /// Exec requested without a command.
    #[error("no command specified")]
    NoCommand,

    // =========================================================================
    // Flag Errors
    // =========================================================================
    /// Insecure option token is not recognized.
    #[error("unknown insecure option '{token}' (permissible: {permissible})")]
    UnknownOption { token: String, permissible: String },
}

impl Error {
    /// Returns true for identifier resolution failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PodNotFound(_) | Self::AppNotFound { .. } | Self::BlobNotFound(_)
        )
    }

    /// Returns true for schema evolution failures.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::MissingMigration(_)
                | Self::MigrationFailed { .. }
                | Self::UnsupportedSchemaVersion { .. }
                | Self::InvalidMigrationRegistry(_)
        )
    }
}
