//! Enumeration of pods across state directories.

use super::handle::Pod;
use super::pods_dir;
use super::state::{PodDir, PodId};
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Visits every pod found in `dirs`.
///
/// Each entry is opened in the directory it was listed in. Pods that moved
/// or vanished between listing and opening are skipped; other open failures
/// are passed to `f` so the caller decides whether to report or abort.
/// Entries whose names are not UUIDs are ignored. A missing state directory
/// contributes nothing.
pub fn walk_pods<F>(data_dir: &Path, dirs: &[PodDir], mut f: F) -> Result<()>
where
    F: FnMut(Result<Pod>),
{
    for &dir in dirs {
        let state_dir = pods_dir(data_dir).join(dir.dir_name());
        let entries = match fs::read_dir(&state_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            match name.to_str().map(PodId::parse) {
                Some(Ok(id)) => ids.push(id),
                _ => warn!(
                    "Ignoring {} in {}: not a pod ID",
                    name.to_string_lossy(),
                    state_dir.display()
                ),
            }
        }
        ids.sort();

        for id in ids {
            match Pod::open_at(data_dir, dir, &id) {
                Err(Error::PodNotFound(_)) => {
                    debug!("Pod {} left {} while walking", id, dir.dir_name());
                }
                result => f(result),
            }
        }
    }
    Ok(())
}
