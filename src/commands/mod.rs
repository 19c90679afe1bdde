//! # Operator Commands
//!
//! Handlers behind `magikpod app exec|stop|list`. Each takes the
//! invocation's [`Config`] explicitly; commands that enter a pod also take
//! the [`NamespaceBridge`] to go through.
//!
//! | Command | Requires        | Bridge call          |
//! |---------|-----------------|----------------------|
//! | `exec`  | running pod     | `enter` once         |
//! | `stop`  | running pod     | `nsenter` twice      |
//! | `list`  | -               | none                 |
//!
//! Resolution failures are returned before the bridge is touched. Once the
//! bridge has run a helper, its exit status is the command's outcome.

pub mod exec;
pub mod list;
pub mod stop;

pub use exec::exec;
pub use list::{ListError, ListOptions, ListReport, ListRow, list, write_errors, write_report};
pub use stop::stop;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pod::{AppName, Pod, PodState};
use crate::store::Store;
use std::path::PathBuf;
use tracing::debug;

/// A running pod with the app to act on resolved.
pub(crate) struct RunningApp {
    pub pod: Pod,
    pub pid: i32,
    pub app: AppName,
}

/// Resolves `identifier` to a running pod, its PID 1, and the target app.
pub(crate) fn resolve_running_app(config: &Config, identifier: &str) -> Result<RunningApp> {
    let pod = Pod::resolve(&config.data_dir, identifier)?;
    if !pod.is_running() {
        return Err(Error::InvalidState {
            pod: pod.id().to_string(),
            state: pod.state().to_string(),
            expected: PodState::Running.to_string(),
        });
    }
    let pid = pod.container_pid1()?;
    let app = pod.resolve_app_name(config.app.as_deref())?;
    debug!("Pod {} PID 1 is {}, target app {}", pod.id(), pid, app);
    Ok(RunningApp { pod, pid, app })
}

/// Root filesystem of the stage1 image the pod was prepared with.
pub(crate) fn stage1_rootfs(config: &Config, pod: &Pod) -> Result<PathBuf> {
    let store = Store::open(&config.data_dir)?;
    let id = pod.stage1_tree_store_id()?;
    Ok(store.tree_store_rootfs(&id))
}
