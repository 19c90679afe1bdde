//! # Pod State Model
//!
//! Pods live on disk as directories named by UUID under
//! `<data_dir>/pods/<state dir>/`. Their lifecycle state is never stored
//! explicitly; it is derived from which directory holds the pod and whether
//! an owner holds the directory's exclusive lock.
//!
//! ```text
//! <data_dir>/pods/
//! ├── prepare/<uuid>/          Preparing (locked) / AbortedPrepare
//! ├── prepared/<uuid>/         Prepared
//! ├── run/<uuid>/              Running (locked by stage1) / Exited
//! ├── exited-garbage/<uuid>/   ExitedDeleting (locked) / ExitedGarbage
//! └── garbage/<uuid>/          Deleting (locked) / Garbage
//! ```
//!
//! ## Pod Directory Contents
//!
//! | File                  | Written by  | Read for                     |
//! |-----------------------|-------------|------------------------------|
//! | `pod`                 | prepare     | apps, image names            |
//! | `pid` / `ppid`        | stage1      | PID 1, start time            |
//! | `stage1TreeStoreID`   | prepare     | stage1 rootfs location       |
//! | `stage1/manifest`     | prepare     | enter entrypoint             |
//! | `appsinfo/<app>/manifest` | prepare | image name fallback          |
//! | `net-info.json`       | stage1      | network attachments          |
//!
//! ## Example
//!
//! ```rust,ignore
//! use magikpod::pod::Pod;
//!
//! let pod = Pod::resolve(data_dir, "6a7b")?;
//! if pod.is_running() {
//!     let pid = pod.container_pid1()?;
//!     let app = pod.resolve_app_name(None)?;
//! }
//! pod.close()?;
//! ```

mod handle;
mod lock;
mod manifest;
mod state;
mod walk;

use crate::constants::PODS_DIR;
use std::path::{Path, PathBuf};

pub use handle::{Pod, PodNetwork};
pub use lock::DirLock;
pub use manifest::{
    Annotation, AppName, ImageManifest, PodManifest, RuntimeApp, RuntimeImage, read_json,
};
pub use state::{PodDir, PodId, PodState};
pub use walk::walk_pods;

/// Root of the pod state directories.
pub fn pods_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(PODS_DIR)
}
