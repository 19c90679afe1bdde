//! `app exec`: run a command inside an app of a running pod.

use super::{RunningApp, resolve_running_app, stage1_rootfs};
use crate::config::Config;
use crate::enter::{EnterRequest, NamespaceBridge};
use crate::error::{Error, Result};
use std::process::ExitStatus;
use tracing::info;

/// Runs `argv` in the selected app of pod `identifier`.
///
/// Checks, in order: the pod resolves and is running, its PID 1 is known,
/// the app resolves, a command was given, and the stage1 rootfs is known.
/// Only then is the pod lock released and the bridge entered.
pub fn exec(
    config: &Config,
    bridge: &dyn NamespaceBridge,
    identifier: &str,
    argv: &[String],
) -> Result<ExitStatus> {
    let RunningApp { pod, pid, app } = resolve_running_app(config, identifier)?;
    if argv.is_empty() {
        return Err(Error::NoCommand);
    }
    let stage1_rootfs = stage1_rootfs(config, &pod)?;

    let req = EnterRequest {
        pod_dir: pod.path().to_path_buf(),
        pid,
        app,
        stage1_rootfs,
        argv: argv.to_vec(),
    };
    info!("Entering app {} of pod {}", req.app, pod.id());
    pod.close()?;

    bridge.enter(&req)
}
