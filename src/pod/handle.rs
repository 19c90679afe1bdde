//! Pod handle: a locked view of one pod directory.

use super::lock::DirLock;
use super::pods_dir;
use super::manifest::{AppName, ImageManifest, PodManifest, RuntimeApp, read_json};
use super::state::{PodDir, PodId, PodState};
use crate::constants::{
    APPS_INFO_DIR, CHILD_PID_RETRIES, CHILD_PID_RETRY_INTERVAL, MANIFEST_FILE, NET_INFO_FILE,
    PID_FILE, POD_MANIFEST_FILE, PPID_FILE, STAGE1_TREE_STORE_ID_FILE,
};
use crate::error::{Error, Result};
use crate::store::TreeStoreId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Network attachment recorded by stage1 in `net-info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodNetwork {
    #[serde(rename = "netName")]
    pub name: String,
    #[serde(default)]
    pub ip: String,
}

impl std::fmt::Display for PodNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:ip4={}", self.name, self.ip)
    }
}

/// Handle to a pod directory.
///
/// Holds a shared lock on the directory (unless an owner holds it
/// exclusively, which is how running and preparing pods are recognized).
/// All derived facts are read lazily from files under the directory. The
/// lock is released by [`Pod::close`] or on drop.
#[derive(Debug)]
pub struct Pod {
    id: PodId,
    path: PathBuf,
    dir: PodDir,
    state: PodState,
    lock: DirLock,
}

impl Pod {
    /// Opens the pod with a full ID, wherever it currently lives.
    ///
    /// Directories are probed in lifecycle order, so a pod moving forward
    /// while we look is found in its new directory.
    pub fn open(data_dir: &Path, id: &PodId) -> Result<Self> {
        for dir in PodDir::ALL {
            match Self::open_at(data_dir, dir, id) {
                Ok(pod) => return Ok(pod),
                Err(Error::PodNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::PodNotFound(id.to_string()))
    }

    /// Opens the pod in a specific state directory.
    pub fn open_at(data_dir: &Path, dir: PodDir, id: &PodId) -> Result<Self> {
        let path = pods_dir(data_dir).join(dir.dir_name()).join(id.as_str());
        let lock = match DirLock::try_shared(&path) {
            Ok(lock) => lock,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::PodNotFound(id.to_string()));
            }
            Err(e) => return Err(e),
        };
        let state = dir.state(lock.is_held_elsewhere());
        debug!("Opened pod {} in state {}", id, state);
        Ok(Self {
            id: *id,
            path,
            dir,
            state,
            lock,
        })
    }

    /// Resolves a full UUID or an unambiguous UUID prefix.
    pub fn resolve(data_dir: &Path, identifier: &str) -> Result<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(Error::InvalidPodId {
                id: identifier.to_string(),
                reason: "empty identifier".to_string(),
            });
        }
        if let Ok(id) = PodId::parse(identifier) {
            return Self::open(data_dir, &id);
        }
        if !identifier.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Err(Error::InvalidPodId {
                id: identifier.to_string(),
                reason: "not a UUID or UUID prefix".to_string(),
            });
        }

        let prefix = identifier.to_ascii_lowercase();
        let matches = Self::matching_ids(data_dir, &prefix)?;
        match matches.len() {
            0 => Err(Error::PodNotFound(identifier.to_string())),
            1 => {
                let id = matches.into_iter().next().ok_or_else(|| {
                    Error::PodNotFound(identifier.to_string())
                })?;
                Self::open(data_dir, &id)
            }
            _ => Err(Error::AmbiguousPodId {
                prefix: identifier.to_string(),
                matches: matches.iter().map(PodId::to_string).collect(),
            }),
        }
    }

    fn matching_ids(data_dir: &Path, prefix: &str) -> Result<BTreeSet<PodId>> {
        let mut matches = BTreeSet::new();
        for dir in PodDir::ALL {
            let state_dir = pods_dir(data_dir).join(dir.dir_name());
            let entries = match fs::read_dir(&state_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let name = entry?.file_name();
                let Some(name) = name.to_str() else { continue };
                if name.starts_with(prefix)
                    && let Ok(id) = PodId::parse(name)
                {
                    matches.insert(id);
                }
            }
        }
        Ok(matches)
    }

    // =========================================================================
    // Identity and State
    // =========================================================================

    pub fn id(&self) -> &PodId {
        &self.id
    }

    /// Pod directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> PodDir {
        self.dir
    }

    pub fn state(&self) -> PodState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PodState::Running
    }

    pub fn is_preparing(&self) -> bool {
        self.state == PodState::Preparing
    }

    pub fn is_aborted_prepare(&self) -> bool {
        self.state == PodState::AbortedPrepare
    }

    pub fn is_prepared(&self) -> bool {
        self.state == PodState::Prepared
    }

    pub fn is_exited(&self) -> bool {
        self.state == PodState::Exited
    }

    pub fn is_exited_deleting(&self) -> bool {
        self.state == PodState::ExitedDeleting
    }

    pub fn is_garbage(&self) -> bool {
        matches!(self.state, PodState::Garbage | PodState::ExitedGarbage)
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self.state, PodState::Deleting | PodState::ExitedDeleting)
    }

    fn require_state(&self, expected: PodState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                pod: self.id.to_string(),
                state: self.state.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Process
    // =========================================================================

    /// PID of the pod's PID 1.
    ///
    /// Stage1 records it either directly in `pid`, or records its own PID
    /// in `ppid` and forks PID 1 as its child.
    pub fn container_pid1(&self) -> Result<i32> {
        self.require_state(PodState::Running)?;
        let no_such_process = |reason: String| Error::NoSuchProcess {
            pod: self.id.to_string(),
            reason,
        };

        match read_pid(&self.path.join(PID_FILE)) {
            Ok(pid) => return Ok(pid),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(no_such_process(format!("{}: {}", PID_FILE, e))),
        }

        let ppid = read_pid(&self.path.join(PPID_FILE)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                no_such_process(format!("neither {} nor {} recorded", PID_FILE, PPID_FILE))
            } else {
                no_such_process(format!("{}: {}", PPID_FILE, e))
            }
        })?;

        for attempt in 0..CHILD_PID_RETRIES {
            match first_child_pid(Path::new("/proc"), ppid) {
                Ok(Some(pid)) => return Ok(pid),
                Ok(None) => {
                    debug!(
                        "PID 1 of pod {} not forked yet (attempt {})",
                        self.id, attempt
                    );
                    std::thread::sleep(CHILD_PID_RETRY_INTERVAL);
                }
                Err(e) => return Err(no_such_process(format!("children of {}: {}", ppid, e))),
            }
        }
        Err(no_such_process(format!("process {} has no children", ppid)))
    }

    // =========================================================================
    // Manifest and Apps
    // =========================================================================

    /// Parses the pod manifest.
    pub fn manifest(&self) -> Result<PodManifest> {
        read_json(&self.path.join(POD_MANIFEST_FILE))
    }

    /// Picks the app to act on.
    ///
    /// An explicit name must exist in the manifest. Without one the pod must
    /// contain exactly one app.
    pub fn resolve_app_name(&self, explicit: Option<&str>) -> Result<AppName> {
        let manifest = self.manifest()?;
        match explicit {
            Some(name) => {
                let name = AppName::parse(name)?;
                if manifest.app(&name).is_none() {
                    return Err(Error::AppNotFound {
                        pod: self.id.to_string(),
                        app: name.to_string(),
                    });
                }
                Ok(name)
            }
            None => match manifest.apps.as_slice() {
                [] => Err(Error::NoApps(self.id.to_string())),
                [app] => Ok(app.name.clone()),
                _ => Err(Error::AmbiguousApp {
                    pod: self.id.to_string(),
                    apps: manifest.app_names(),
                }),
            },
        }
    }

    /// Image name of an app: from the pod manifest if recorded there,
    /// otherwise from the app's image manifest.
    pub fn app_image_name(&self, app: &RuntimeApp) -> Result<String> {
        if let Some(name) = app.image.name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        let path = self
            .path
            .join(APPS_INFO_DIR)
            .join(app.name.as_str())
            .join(MANIFEST_FILE);
        let manifest: ImageManifest = read_json(&path)?;
        if manifest.name.is_empty() {
            return Err(Error::InvalidManifest {
                path,
                reason: "image manifest has no name".to_string(),
            });
        }
        Ok(manifest.name)
    }

    // =========================================================================
    // Stage1, Timestamps, Networks
    // =========================================================================

    /// Tree store ID of the stage1 filesystem this pod was prepared with.
    pub fn stage1_tree_store_id(&self) -> Result<TreeStoreId> {
        let raw = fs::read_to_string(self.path.join(STAGE1_TREE_STORE_ID_FILE))?;
        TreeStoreId::parse(&raw)
    }

    /// When the pod was created.
    pub fn creation_time(&self) -> Result<DateTime<Utc>> {
        let meta = match fs::metadata(self.path.join(POD_MANIFEST_FILE)) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::metadata(&self.path)?,
            Err(e) => return Err(e.into()),
        };
        Ok(meta.modified()?.into())
    }

    /// When the pod started, `None` if it never ran.
    pub fn start_time(&self) -> Result<Option<DateTime<Utc>>> {
        for file in [PID_FILE, PPID_FILE] {
            match fs::metadata(self.path.join(file)) {
                Ok(meta) => return Ok(Some(meta.modified()?.into())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Networks the pod is attached to. Empty if stage1 recorded none.
    pub fn networks(&self) -> Result<Vec<PodNetwork>> {
        let path = self.path.join(NET_INFO_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Releases the directory lock.
    pub fn close(self) -> Result<()> {
        let id = self.id;
        self.lock.release().inspect_err(|e| {
            warn!("Failed to release lock of pod {}: {}", id, e);
        })
    }
}

/// Reads a decimal PID file.
fn read_pid(path: &Path) -> io::Result<i32> {
    let raw = fs::read_to_string(path)?;
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid pid '{}'", raw.trim()),
            )
        })
}

/// First child of `ppid` according to `<proc_root>/<ppid>/task/<ppid>/children`.
///
/// `Ok(None)` means the process exists but has not forked yet.
pub(crate) fn first_child_pid(proc_root: &Path, ppid: i32) -> io::Result<Option<i32>> {
    let path = proc_root
        .join(ppid.to_string())
        .join("task")
        .join(ppid.to_string())
        .join("children");
    let raw = fs::read_to_string(&path)?;
    match raw.split_whitespace().next() {
        None => Ok(None),
        Some(pid) => pid.parse::<i32>().map(Some).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid child pid '{}'", pid),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_proc(children: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        let task = temp.path().join("42/task/42");
        fs::create_dir_all(&task).unwrap();
        fs::write(task.join("children"), children).unwrap();
        temp
    }

    #[test]
    fn test_first_child_pid() {
        let proc_root = fake_proc("1234 1300 ");
        assert_eq!(first_child_pid(proc_root.path(), 42).unwrap(), Some(1234));
    }

    #[test]
    fn test_first_child_pid_not_forked_yet() {
        let proc_root = fake_proc("");
        assert_eq!(first_child_pid(proc_root.path(), 42).unwrap(), None);
    }

    #[test]
    fn test_first_child_pid_missing_process() {
        let proc_root = fake_proc("");
        assert!(first_child_pid(proc_root.path(), 7).is_err());
    }

    #[test]
    fn test_read_pid_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pid");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            read_pid(&path).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
        fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid(&path).unwrap(), 4242);
    }
}
