//! Pod state types.
//!
//! This module defines the lifecycle types for pods:
//! - `PodId`: Unique pod identifier (the pod directory name)
//! - `PodDir`: State directory a pod currently lives in
//! - `PodState`: Lifecycle state derived from directory and lock

use crate::constants::{EXITED_GARBAGE_DIR, GARBAGE_DIR, PREPARED_DIR, PREPARE_DIR, RUN_DIR};
use crate::error::{Error, Result};
use std::str::FromStr;

// =============================================================================
// Pod ID
// =============================================================================

/// Unique identifier for a pod.
///
/// Pod directories are named by the hyphenated lowercase UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodId(uuid::Uuid);

impl PodId {
    /// Creates a new random pod ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parses a full UUID.
    pub fn parse(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidPodId {
                id: s.to_string(),
                reason: e.to_string(),
            })
    }

    /// Returns the UUID as a string.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl Default for PodId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for PodId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for PodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// =============================================================================
// Pod Directory
// =============================================================================

/// State directory under `<data_dir>/pods/`.
///
/// Pods only ever move forward through these directories, in the order of
/// [`PodDir::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodDir {
    Prepare,
    Prepared,
    Run,
    ExitedGarbage,
    Garbage,
}

impl PodDir {
    /// Every state directory, in lifecycle order.
    pub const ALL: [PodDir; 5] = [
        PodDir::Prepare,
        PodDir::Prepared,
        PodDir::Run,
        PodDir::ExitedGarbage,
        PodDir::Garbage,
    ];

    /// Directory name under `pods/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Prepare => PREPARE_DIR,
            Self::Prepared => PREPARED_DIR,
            Self::Run => RUN_DIR,
            Self::ExitedGarbage => EXITED_GARBAGE_DIR,
            Self::Garbage => GARBAGE_DIR,
        }
    }

    /// State of a pod in this directory, given whether another process holds
    /// the pod's exclusive lock.
    pub fn state(&self, locked_elsewhere: bool) -> PodState {
        match (self, locked_elsewhere) {
            (Self::Prepare, true) => PodState::Preparing,
            (Self::Prepare, false) => PodState::AbortedPrepare,
            (Self::Prepared, _) => PodState::Prepared,
            (Self::Run, true) => PodState::Running,
            (Self::Run, false) => PodState::Exited,
            (Self::ExitedGarbage, true) => PodState::ExitedDeleting,
            (Self::ExitedGarbage, false) => PodState::ExitedGarbage,
            (Self::Garbage, true) => PodState::Deleting,
            (Self::Garbage, false) => PodState::Garbage,
        }
    }
}

// =============================================================================
// Pod State
// =============================================================================

/// Pod lifecycle state.
///
/// ```text
///   Preparing ──▶ Prepared ──▶ Running ──▶ Exited ──▶ ExitedGarbage ──▶ ExitedDeleting
///       │             │
///       ▼             └──────────────────────────────▶ Garbage ──▶ Deleting
///   AbortedPrepare ─────────────────────────────────────▲
/// ```
///
/// Transitions are made by preparation, stage1 and garbage collection; this
/// crate only observes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodState {
    Preparing,
    AbortedPrepare,
    Prepared,
    Running,
    Exited,
    ExitedDeleting,
    ExitedGarbage,
    Garbage,
    Deleting,
}

impl PodState {
    /// Returns the state name as shown to operators.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::AbortedPrepare => "aborted-prepare",
            Self::Prepared => "prepared",
            Self::Running => "running",
            Self::Exited => "exited",
            Self::ExitedDeleting => "exited-deleting",
            Self::ExitedGarbage => "exited-garbage",
            Self::Garbage => "garbage",
            Self::Deleting => "deleting",
        }
    }

    /// Whether the pod manifest is complete and safe to read.
    pub fn has_manifest(&self) -> bool {
        !matches!(
            self,
            Self::Preparing | Self::AbortedPrepare | Self::ExitedDeleting
        )
    }
}

impl std::fmt::Display for PodState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
