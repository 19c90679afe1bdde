//! Tests for the operator commands.
//!
//! Drives `exec`, `stop` and `list` against on-disk pod fixtures, with a
//! recording bridge in place of the real namespace helpers.

mod common;

use common::{POD_A, POD_B, POD_C, STAGE1_ID, create_pod, create_running_pod, manifest_json};
use magikpod::commands::{self, ListOptions};
use magikpod::enter::{EnterRequest, NamespaceBridge, NsenterRequest};
use magikpod::{Config, Error, Result};
use std::cell::RefCell;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use tempfile::TempDir;

// =============================================================================
// Recording Bridge
// =============================================================================

#[derive(Default)]
struct RecordingBridge {
    enters: RefCell<Vec<EnterRequest>>,
    nsenters: RefCell<Vec<NsenterRequest>>,
    /// Exit codes returned by successive nsenter calls; 0 once exhausted.
    nsenter_codes: RefCell<Vec<i32>>,
    enter_code: i32,
}

impl RecordingBridge {
    fn with_enter_code(code: i32) -> Self {
        Self {
            enter_code: code,
            ..Self::default()
        }
    }

    fn with_nsenter_codes(codes: &[i32]) -> Self {
        Self {
            nsenter_codes: RefCell::new(codes.iter().rev().copied().collect()),
            ..Self::default()
        }
    }

    fn invocations(&self) -> usize {
        self.enters.borrow().len() + self.nsenters.borrow().len()
    }
}

fn exit_code(code: i32) -> ExitStatus {
    ExitStatus::from_raw(code << 8)
}

impl NamespaceBridge for RecordingBridge {
    fn enter(&self, req: &EnterRequest) -> Result<ExitStatus> {
        self.enters.borrow_mut().push(req.clone());
        Ok(exit_code(self.enter_code))
    }

    fn nsenter(&self, req: &NsenterRequest) -> Result<ExitStatus> {
        self.nsenters.borrow_mut().push(req.clone());
        let code = self.nsenter_codes.borrow_mut().pop().unwrap_or(0);
        Ok(exit_code(code))
    }
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

// =============================================================================
// Exec Tests
// =============================================================================

#[test]
fn test_exec_enters_running_pod() {
    let temp_dir = TempDir::new().unwrap();
    let (pod_dir, _owner) = create_running_pod(temp_dir.path(), POD_A, &[("web", None)]);
    let config = Config::new(temp_dir.path());
    let bridge = RecordingBridge::with_enter_code(3);

    let status = commands::exec(&config, &bridge, "6a7b", &argv(&["/bin/sh", "-c", "exit 3"])).unwrap();

    assert_eq!(status.code(), Some(3));
    let enters = bridge.enters.borrow();
    assert_eq!(enters.len(), 1);
    let req = &enters[0];
    assert_eq!(req.pod_dir, pod_dir);
    assert_eq!(req.pid, 4242);
    assert_eq!(req.app.as_str(), "web");
    assert_eq!(req.argv, argv(&["/bin/sh", "-c", "exit 3"]));
    assert_eq!(
        req.stage1_rootfs,
        temp_dir.path().join("cas/tree").join(STAGE1_ID).join("rootfs")
    );
}

#[test]
fn test_exec_on_stopped_pod_never_enters() {
    let temp_dir = TempDir::new().unwrap();
    for dir in ["prepare", "prepared", "run", "exited-garbage", "garbage"] {
        let id = POD_A;
        let data_dir = temp_dir.path().join(dir);
        let path = create_pod(&data_dir, dir, id, Some(&manifest_json(&[("web", None)])));
        fs::write(path.join("pid"), "4242").unwrap();

        let bridge = RecordingBridge::default();
        let err = commands::exec(&Config::new(&data_dir), &bridge, id, &argv(&["true"])).unwrap_err();

        assert!(
            matches!(err, Error::InvalidState { .. }),
            "pod in {}/: {:?}",
            dir,
            err
        );
        assert_eq!(bridge.invocations(), 0);
    }
}

#[test]
fn test_exec_without_command() {
    let temp_dir = TempDir::new().unwrap();
    let (_, _owner) = create_running_pod(temp_dir.path(), POD_A, &[("web", None)]);
    let bridge = RecordingBridge::default();

    let err = commands::exec(&Config::new(temp_dir.path()), &bridge, POD_A, &[]).unwrap_err();
    assert!(matches!(err, Error::NoCommand));
    assert_eq!(bridge.invocations(), 0);
}

#[test]
fn test_exec_requires_app_in_multi_app_pod() {
    let temp_dir = TempDir::new().unwrap();
    let (_, _owner) = create_running_pod(temp_dir.path(), POD_A, &[("web", None), ("db", None)]);
    let bridge = RecordingBridge::default();

    let err = commands::exec(&Config::new(temp_dir.path()), &bridge, POD_A, &argv(&["true"])).unwrap_err();
    assert!(matches!(err, Error::AmbiguousApp { .. }));

    let config = Config::new(temp_dir.path()).with_app("db");
    commands::exec(&config, &bridge, POD_A, &argv(&["true"])).unwrap();
    assert_eq!(bridge.enters.borrow()[0].app.as_str(), "db");
}

#[test]
fn test_exec_ambiguous_pod() {
    let temp_dir = TempDir::new().unwrap();
    let (_, _owner_a) = create_running_pod(temp_dir.path(), POD_A, &[("web", None)]);
    let (_, _owner_b) = create_running_pod(temp_dir.path(), POD_B, &[("web", None)]);
    let bridge = RecordingBridge::default();

    let err = commands::exec(&Config::new(temp_dir.path()), &bridge, "6a7b", &argv(&["true"])).unwrap_err();
    assert!(matches!(err, Error::AmbiguousPodId { .. }));
    assert_eq!(bridge.invocations(), 0);
}

// =============================================================================
// Stop Tests
// =============================================================================

#[test]
fn test_stop_stops_reaper_then_app() {
    let temp_dir = TempDir::new().unwrap();
    let (pod_dir, _owner) = create_running_pod(temp_dir.path(), POD_A, &[("web", None)]);
    let bridge = RecordingBridge::with_nsenter_codes(&[0, 5]);

    let status = commands::stop(&Config::new(temp_dir.path()), &bridge, POD_A).unwrap();

    assert_eq!(status.code(), Some(5), "status of the second call is returned");
    let calls = bridge.nsenters.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].cmdline, argv(&["/bin/systemctl", "stop", "reaper-web"]));
    assert_eq!(calls[1].cmdline, argv(&["/bin/systemctl", "stop", "web"]));
    for call in calls.iter() {
        assert_eq!(call.pid, 4242);
        assert_eq!(call.pod_dir, pod_dir);
    }
}

#[test]
fn test_stop_halts_when_reaper_stop_fails() {
    let temp_dir = TempDir::new().unwrap();
    let (_, _owner) = create_running_pod(temp_dir.path(), POD_A, &[("web", None)]);
    let bridge = RecordingBridge::with_nsenter_codes(&[1]);

    let err = commands::stop(&Config::new(temp_dir.path()), &bridge, POD_A).unwrap_err();
    assert!(matches!(err, Error::CommandFailed { .. }), "got {:?}", err);
    assert_eq!(bridge.nsenters.borrow().len(), 1);
}

#[test]
fn test_stop_on_exited_pod() {
    let temp_dir = TempDir::new().unwrap();
    create_pod(temp_dir.path(), "run", POD_A, Some(&manifest_json(&[("web", None)])));
    let bridge = RecordingBridge::default();

    let err = commands::stop(&Config::new(temp_dir.path()), &bridge, POD_A).unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(bridge.invocations(), 0);
}

// =============================================================================
// List Tests
// =============================================================================

#[test]
fn test_list_rows_per_app() {
    let temp_dir = TempDir::new().unwrap();
    let (_, _owner) = create_running_pod(
        temp_dir.path(),
        POD_A,
        &[("web", Some("example.com/web")), ("db", Some("example.com/db"))],
    );
    create_pod(
        temp_dir.path(),
        "prepared",
        POD_C,
        Some(&manifest_json(&[("cache", Some("example.com/cache"))])),
    );

    let report = commands::list(&Config::new(temp_dir.path()), &ListOptions::default()).unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    let summary: Vec<(&str, &str, &str)> = report
        .rows
        .iter()
        .map(|r| (r.app.as_str(), r.image_name.as_str(), r.state.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("cache", "example.com/cache", "prepared"),
            ("web", "example.com/web", "running"),
            ("db", "example.com/db", ""),
        ]
    );
    assert!(!report.rows[1].started.is_empty());
    assert!(report.rows[2].created.is_empty(), "pod columns only on first app");
}

#[test]
fn test_list_accumulates_errors() {
    let temp_dir = TempDir::new().unwrap();
    create_pod(temp_dir.path(), "prepared", POD_A, Some("{not json"));
    create_pod(temp_dir.path(), "prepared", POD_B, Some(&manifest_json(&[])));
    create_pod(
        temp_dir.path(),
        "prepared",
        POD_C,
        Some(&manifest_json(&[("web", None)])),
    );

    let report = commands::list(&Config::new(temp_dir.path()), &ListOptions::default()).unwrap();

    assert_eq!(report.rows.len(), 1, "valid pod still listed");
    assert_eq!(report.rows[0].image_name, "--");
    assert_eq!(report.errors.len(), 3);
    assert!(matches!(report.errors[0].error, Error::InvalidManifest { .. }));
    assert!(matches!(report.errors[1].error, Error::NoApps(_)));
    assert!(matches!(report.errors[2].error, Error::InvalidManifest { .. }));
    assert_eq!(report.errors[0].pod.as_deref(), Some(POD_A));

    let mut out = Vec::new();
    commands::write_errors(&report.errors, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("3 error(s) encountered when listing pods:"));
}

#[test]
fn test_list_skips_manifest_of_preparing_pod() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_pod(temp_dir.path(), "prepare", POD_A, Some("{partial"));
    let _owner = common::hold_exclusive(&path);

    let report = commands::list(&Config::new(temp_dir.path()), &ListOptions::default()).unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(report.rows.is_empty());
}

#[test]
fn test_list_prefix_and_full_output() {
    let temp_dir = TempDir::new().unwrap();
    create_pod(temp_dir.path(), "prepared", POD_A, Some(&manifest_json(&[("web", Some("example.com/web"))])));
    create_pod(temp_dir.path(), "prepared", POD_C, Some(&manifest_json(&[("db", Some("example.com/db"))])));

    let opts = ListOptions {
        full: true,
        no_legend: false,
        prefix: Some("C0FF".to_string()),
    };
    let report = commands::list(&Config::new(temp_dir.path()), &opts).unwrap();
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].app, "db");
    assert_eq!(report.rows[0].image_id, "sha512-aaaaaaaaaaaa");

    let mut out = Vec::new();
    commands::write_report(&report, &opts, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    let mut lines = out.lines();
    assert_eq!(
        lines.next(),
        Some("APP\tIMAGE NAME\tIMAGE ID\tSTATE\tCREATED\tSTARTED\tNETWORKS")
    );
    let fields: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert_eq!(&fields[..4], &["db", "example.com/db", "sha512-aaaaaaaaaaaa", "prepared"]);
    assert_eq!(fields.len(), 7);
}

#[test]
fn test_list_excludes_garbage_dir() {
    let temp_dir = TempDir::new().unwrap();
    create_pod(temp_dir.path(), "garbage", POD_A, Some(&manifest_json(&[("web", None)])));

    let report = commands::list(&Config::new(temp_dir.path()), &ListOptions::default()).unwrap();
    assert!(report.rows.is_empty());
}
