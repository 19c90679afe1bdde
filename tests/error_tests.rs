//! Tests for error types.
//!
//! Validates display formatting, source chaining, and error categories.

use magikpod::Error;
use std::error::Error as _;
use std::io;
use std::path::PathBuf;

// =============================================================================
// Identifier Error Tests
// =============================================================================

#[test]
fn test_ambiguous_pod_id_lists_matches() {
    let err = Error::AmbiguousPodId {
        prefix: "6a7b".to_string(),
        matches: vec!["6a7b-1".to_string(), "6a7b-2".to_string()],
    };
    let msg = err.to_string();

    assert!(msg.contains("6a7b"), "should include the prefix");
    assert!(msg.contains("6a7b-1, 6a7b-2"), "should list matches");
}

#[test]
fn test_ambiguous_app_suggests_flag() {
    let err = Error::AmbiguousApp {
        pod: "pod".to_string(),
        apps: vec!["web".to_string(), "db".to_string()],
    };
    let msg = err.to_string();

    assert!(msg.contains("web, db"));
    assert!(msg.contains("--app"));
}

#[test]
fn test_not_found_category() {
    assert!(Error::PodNotFound("x".to_string()).is_not_found());
    assert!(Error::BlobNotFound("sha512-x".to_string()).is_not_found());
    assert!(
        Error::AppNotFound {
            pod: "p".to_string(),
            app: "a".to_string()
        }
        .is_not_found()
    );
    assert!(!Error::NoCommand.is_not_found());
}

// =============================================================================
// State Error Tests
// =============================================================================

#[test]
fn test_invalid_state_display() {
    let err = Error::InvalidState {
        pod: "6a7b".to_string(),
        state: "exited".to_string(),
        expected: "running".to_string(),
    };
    let msg = err.to_string();

    assert!(msg.contains("exited"));
    assert!(msg.contains("running"));
}

// =============================================================================
// Infrastructure Error Tests
// =============================================================================

#[test]
fn test_lock_error_keeps_source() {
    let err = Error::Lock {
        path: PathBuf::from("/var/lib/magikpod/pods/run/x"),
        source: io::Error::from(io::ErrorKind::PermissionDenied),
    };

    assert!(err.to_string().contains("/var/lib/magikpod/pods/run/x"));
    assert!(err.source().is_some());
}

#[test]
fn test_io_error_conversion() {
    let err: Error = io::Error::from(io::ErrorKind::NotFound).into();
    assert!(matches!(err, Error::Io(_)));
}

// =============================================================================
// Schema Error Tests
// =============================================================================

#[test]
fn test_schema_error_category() {
    assert!(Error::MissingMigration(3).is_schema_error());
    assert!(
        Error::UnsupportedSchemaVersion {
            requested: 7,
            supported: 6
        }
        .is_schema_error()
    );
    assert!(Error::InvalidMigrationRegistry("gap".to_string()).is_schema_error());
    assert!(!Error::PodNotFound("x".to_string()).is_schema_error());
}

#[test]
fn test_unsupported_schema_version_display() {
    let msg = Error::UnsupportedSchemaVersion {
        requested: 7,
        supported: 6,
    }
    .to_string();

    assert!(msg.contains('7'));
    assert!(msg.contains('6'));
}

// =============================================================================
// Execution Error Tests
// =============================================================================

#[test]
fn test_command_failed_display() {
    let err = Error::CommandFailed {
        command: "/bin/systemctl stop reaper-web".to_string(),
        status: "exit status: 1".to_string(),
    };
    let msg = err.to_string();

    assert!(msg.contains("reaper-web"));
    assert!(msg.contains("exit status: 1"));
}

#[test]
fn test_unknown_option_lists_permissible() {
    let err = Error::UnknownOption {
        token: "warp".to_string(),
        permissible: "none, image, tls".to_string(),
    };
    let msg = err.to_string();

    assert!(msg.contains("warp"));
    assert!(msg.contains("none, image, tls"));
}
