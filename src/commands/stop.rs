//! `app stop`: stop one app of a running pod through its service manager.

use super::{RunningApp, resolve_running_app, stage1_rootfs};
use crate::config::Config;
use crate::enter::{NamespaceBridge, NsenterRequest, stop_commands};
use crate::error::{Error, Result};
use std::process::ExitStatus;
use tracing::info;

/// Stops the selected app of pod `identifier`.
///
/// The app's reaper unit is stopped first; if that fails the app unit is
/// left alone. The status of stopping the app unit is returned.
pub fn stop(config: &Config, bridge: &dyn NamespaceBridge, identifier: &str) -> Result<ExitStatus> {
    let RunningApp { pod, pid, app } = resolve_running_app(config, identifier)?;
    let stage1_rootfs = stage1_rootfs(config, &pod)?;
    let pod_dir = pod.path().to_path_buf();
    info!("Stopping app {} of pod {}", app, pod.id());
    pod.close()?;

    let [reaper, unit] = stop_commands(&app);
    let request = |cmdline: Vec<String>| NsenterRequest {
        pod_dir: pod_dir.clone(),
        pid,
        stage1_rootfs: stage1_rootfs.clone(),
        cmdline,
    };

    let reaper_req = request(reaper);
    let status = bridge.nsenter(&reaper_req)?;
    if !status.success() {
        return Err(Error::CommandFailed {
            command: reaper_req.cmdline.join(" "),
            status: status.to_string(),
        });
    }

    bridge.nsenter(&request(unit))
}
