//! # Namespace Execution Bridge
//!
//! Runs commands inside a running pod's namespaces through one of two
//! helpers:
//!
//! - the stage1 **enter** entrypoint, named by the stage1 image manifest
//!   annotation [`STAGE1_ENTER_ANNOTATION`], which joins a specific app;
//! - **nsenter**, which joins the pod's mount and PID namespaces and is used
//!   to drive the pod's service manager.
//!
//! ## Process Model
//!
//! ```text
//! magikpod ──spawn──▶ helper ──▶ command inside pod
//!    │                   │
//!    └── wait ◀──────────┘  (SIGINT/SIGQUIT ignored while waiting)
//!    │
//!    └── forward_exit(status)  same code, or same signal re-raised
//! ```
//!
//! The helper runs with the pod directory as its working directory. Once a
//! helper has been spawned, its exit status is the command's result: the
//! caller forwards it with [`forward_exit`] and does nothing else.

use crate::constants::{
    MANIFEST_FILE, NSENTER_CANDIDATES, REAPER_UNIT_PREFIX, STAGE1_DIR, STAGE1_ENTER_ANNOTATION,
    SYSTEMCTL,
};
use crate::error::{Error, Result};
use crate::pod::{AppName, ImageManifest, read_json};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, info, warn};

// =============================================================================
// Requests
// =============================================================================

/// Run `argv` as app `app` of the pod whose PID 1 is `pid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterRequest {
    pub pod_dir: PathBuf,
    pub pid: i32,
    pub app: AppName,
    pub stage1_rootfs: PathBuf,
    pub argv: Vec<String>,
}

/// Run `cmdline` in the mount and PID namespaces of `pid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsenterRequest {
    pub pod_dir: PathBuf,
    pub pid: i32,
    pub stage1_rootfs: PathBuf,
    pub cmdline: Vec<String>,
}

// =============================================================================
// Bridge
// =============================================================================

/// Entry into a pod's namespaces.
///
/// Implementations spawn the helper, wait for it, and return its exit
/// status. An `Err` means no helper ran.
pub trait NamespaceBridge {
    fn enter(&self, req: &EnterRequest) -> Result<ExitStatus>;

    fn nsenter(&self, req: &NsenterRequest) -> Result<ExitStatus>;
}

/// Bridge that spawns the real helpers on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stage0Bridge;

impl NamespaceBridge for Stage0Bridge {
    fn enter(&self, req: &EnterRequest) -> Result<ExitStatus> {
        let cmd = enter_command(req)?;
        spawn_and_wait(cmd)
    }

    fn nsenter(&self, req: &NsenterRequest) -> Result<ExitStatus> {
        let cmd = nsenter_command(req)?;
        spawn_and_wait(cmd)
    }
}

// =============================================================================
// Command Construction
// =============================================================================

/// Builds the enter invocation:
/// `<helper> --pid=<pid> --appname=<app> -- <argv...>`.
pub fn enter_command(req: &EnterRequest) -> Result<Command> {
    check_pod_dir(&req.pod_dir)?;
    let helper = enter_helper(&req.pod_dir, &req.stage1_rootfs)?;

    let mut cmd = Command::new(helper);
    cmd.arg(format!("--pid={}", req.pid))
        .arg(format!("--appname={}", req.app))
        .arg("--")
        .args(&req.argv)
        .current_dir(&req.pod_dir);
    Ok(cmd)
}

/// Builds the nsenter invocation: `nsenter -m -p -t <pid> <cmdline...>`.
pub fn nsenter_command(req: &NsenterRequest) -> Result<Command> {
    check_pod_dir(&req.pod_dir)?;
    let nsenter = find_nsenter(&req.stage1_rootfs)?;

    let mut cmd = Command::new(nsenter);
    cmd.args(["-m", "-p", "-t"])
        .arg(req.pid.to_string())
        .args(&req.cmdline)
        .current_dir(&req.pod_dir);
    Ok(cmd)
}

/// The two service manager invocations that stop an app: its reaper first,
/// then the app unit itself.
pub fn stop_commands(app: &AppName) -> [Vec<String>; 2] {
    let stop = |unit: String| vec![SYSTEMCTL.to_string(), "stop".to_string(), unit];
    [
        stop(format!("{}{}", REAPER_UNIT_PREFIX, app)),
        stop(app.to_string()),
    ]
}

fn check_pod_dir(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::DirectoryUnavailable {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(Error::DirectoryUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Resolves the enter entrypoint from the stage1 manifest stored in the pod.
fn enter_helper(pod_dir: &Path, stage1_rootfs: &Path) -> Result<PathBuf> {
    let manifest_path = pod_dir.join(STAGE1_DIR).join(MANIFEST_FILE);
    let manifest: ImageManifest = read_json(&manifest_path)?;
    let entrypoint = manifest
        .annotation(STAGE1_ENTER_ANNOTATION)
        .filter(|value| !value.trim_start_matches('/').is_empty())
        .ok_or_else(|| Error::ExecutionFailed {
            command: "enter".to_string(),
            reason: format!(
                "stage1 manifest {} has no {} annotation",
                manifest_path.display(),
                STAGE1_ENTER_ANNOTATION
            ),
        })?;
    Ok(stage1_rootfs.join(entrypoint.trim_start_matches('/')))
}

/// Locates `nsenter`, preferring the copy shipped in the stage1 rootfs.
fn find_nsenter(stage1_rootfs: &Path) -> Result<PathBuf> {
    if let Some(path) = NSENTER_CANDIDATES
        .iter()
        .map(|candidate| stage1_rootfs.join(candidate))
        .find(|path| path.is_file())
    {
        return Ok(path);
    }
    which::which("nsenter").map_err(|e| Error::ExecutionFailed {
        command: "nsenter".to_string(),
        reason: format!(
            "not found in {} or on the host: {}",
            stage1_rootfs.display(),
            e
        ),
    })
}

// =============================================================================
// Process Handling
// =============================================================================

/// Ignores a signal until dropped, then restores the previous disposition.
struct IgnoreSignal {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl IgnoreSignal {
    fn new(signal: libc::c_int) -> Option<Self> {
        // SAFETY: installing SIG_IGN has no handler code to race with.
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            warn!("Failed to ignore signal {}", signal);
            return None;
        }
        Some(Self { signal, previous })
    }
}

impl Drop for IgnoreSignal {
    fn drop(&mut self) {
        // SAFETY: restores the disposition returned by signal(2).
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

/// Spawns `cmd` and waits for it.
///
/// The child keeps default signal dispositions; only this process ignores
/// terminal interrupts while it waits, so Ctrl-C reaches the command in the
/// pod and its resulting status is what gets forwarded.
pub fn spawn_and_wait(mut cmd: Command) -> Result<ExitStatus> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!("Spawning {:?}", cmd);

    let mut child = cmd.spawn().map_err(|e| Error::ExecutionFailed {
        command: program.clone(),
        reason: e.to_string(),
    })?;

    let _sigint = IgnoreSignal::new(libc::SIGINT);
    let _sigquit = IgnoreSignal::new(libc::SIGQUIT);

    let status = child.wait().map_err(|e| Error::ExecutionFailed {
        command: program.clone(),
        reason: format!("waiting for child {}: {}", child.id(), e),
    })?;
    info!("{} exited with {}", program, status);
    Ok(status)
}

/// Terminates this process the way the child terminated.
///
/// A normal exit is forwarded as the same exit code. A signal death is
/// re-raised with the default disposition; if that does not terminate us,
/// exits with `128 + signal`.
pub fn forward_exit(status: ExitStatus) -> ! {
    use std::os::unix::process::ExitStatusExt;

    if let Some(code) = status.code() {
        std::process::exit(code);
    }
    match status.signal() {
        Some(signal) => {
            // SAFETY: resetting to SIG_DFL and raising only affects this
            // process, which is about to exit anyway.
            unsafe {
                libc::signal(signal, libc::SIG_DFL);
                libc::raise(signal);
            }
            std::process::exit(128 + signal);
        }
        None => std::process::exit(1),
    }
}
