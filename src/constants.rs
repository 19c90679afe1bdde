//! # Control Plane Constants
//!
//! On-disk layout names, schema versions, and the few bounds the control
//! plane enforces. The pod layout is produced by the preparation and stage1
//! subsystems; the names here must match what they write.
//!
//! ## Cross-References
//!
//! - [`crate::pod`]: Uses the pod directory layout and file names
//! - [`crate::store`]: Uses the store layout and [`DB_VERSION`]
//! - [`crate::enter`]: Uses the stage1 annotation and stop unit names

use std::time::Duration;

// =============================================================================
// Data Directory Layout
// =============================================================================

/// Default data directory holding pods and the store.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/magikpod";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "MAGIKPOD_DATA_DIR";

/// Environment variable holding the default insecure options.
pub const INSECURE_OPTIONS_ENV: &str = "MAGIKPOD_INSECURE_OPTIONS";

/// Directory under the data dir containing one subdirectory per pod state.
pub const PODS_DIR: &str = "pods";

/// Pods being prepared (locked) or whose preparation was aborted.
pub const PREPARE_DIR: &str = "prepare";

/// Pods prepared and waiting to run.
pub const PREPARED_DIR: &str = "prepared";

/// Pods running (locked by stage1) or exited.
pub const RUN_DIR: &str = "run";

/// Exited pods marked for collection.
pub const EXITED_GARBAGE_DIR: &str = "exited-garbage";

/// Pods that never ran, marked for collection.
pub const GARBAGE_DIR: &str = "garbage";

// =============================================================================
// Pod Files
// =============================================================================

/// Pod manifest (JSON).
pub const POD_MANIFEST_FILE: &str = "pod";

/// PID of the pod's PID 1, written by stage1.
pub const PID_FILE: &str = "pid";

/// PID of the parent of the pod's PID 1, written by stage1 variants that fork.
pub const PPID_FILE: &str = "ppid";

/// Tree store ID of the stage1 filesystem.
pub const STAGE1_TREE_STORE_ID_FILE: &str = "stage1TreeStoreID";

/// Network attachments of the pod.
pub const NET_INFO_FILE: &str = "net-info.json";

/// Per-app image manifests: `appsinfo/<app>/manifest`.
pub const APPS_INFO_DIR: &str = "appsinfo";

/// Image manifest file name.
pub const MANIFEST_FILE: &str = "manifest";

/// Stage1 image directory inside the pod: `stage1/manifest`.
pub const STAGE1_DIR: &str = "stage1";

/// Stage1 manifest annotation naming the enter entrypoint.
pub const STAGE1_ENTER_ANNOTATION: &str = "coreos.com/rkt/stage1/enter";

/// Maximum manifest size read from a pod directory (1 MiB).
pub const MAX_MANIFEST_SIZE: u64 = 1024 * 1024;

/// Maximum length of an app name.
pub const MAX_APP_NAME_LEN: usize = 512;

// =============================================================================
// PID Resolution
// =============================================================================

/// Attempts to find the child of `ppid` before giving up.
pub const CHILD_PID_RETRIES: u32 = 50;

/// Delay between child lookups while stage1 is still forking.
pub const CHILD_PID_RETRY_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Store Layout
// =============================================================================

/// Store root under the data dir.
pub const STORE_DIR: &str = "cas";

/// Database directory under the store root.
pub const STORE_DB_DIR: &str = "db";

/// SQLite database file.
pub const STORE_DB_FILE: &str = "store.sqlite";

/// Rendered filesystems under the store root.
pub const TREE_STORE_DIR: &str = "tree";

/// Root filesystem directory inside a rendered tree.
pub const TREE_ROOTFS_DIR: &str = "rootfs";

/// Highest schema version this binary reads and migrates to.
pub const DB_VERSION: u32 = 6;

/// How long a store operation waits on a locked database.
pub const STORE_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix of content keys.
pub const BLOB_KEY_PREFIX: &str = "sha512-";

/// Prefix of derived tree store IDs.
pub const TREE_STORE_ID_PREFIX: &str = "deps-";

/// Shortest accepted content key prefix (algorithm plus some hex).
pub const MIN_BLOB_KEY_PREFIX_LEN: usize = 10;

// =============================================================================
// Namespace Entry
// =============================================================================

/// Service manager binary inside stage1.
pub const SYSTEMCTL: &str = "/bin/systemctl";

/// Unit name prefix of the per-app reaper.
pub const REAPER_UNIT_PREFIX: &str = "reaper-";

/// Locations searched for `nsenter` inside the stage1 rootfs.
pub const NSENTER_CANDIDATES: &[&str] =
    &["usr/bin/nsenter", "bin/nsenter", "usr/sbin/nsenter", "sbin/nsenter"];
