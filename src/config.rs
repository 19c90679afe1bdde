//! Per-invocation configuration shared by all commands.

use crate::constants::DEFAULT_DATA_DIR;
use crate::secflags::SecFlags;
use std::path::PathBuf;

/// Settings a command handler runs with.
///
/// Built once by the binary from flags and environment and passed down
/// explicitly; nothing reads global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `pods/` and the store.
    pub data_dir: PathBuf,
    /// App selected with `--app`, if any.
    pub app: Option<String>,
    pub insecure_options: SecFlags,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            app: None,
            insecure_options: SecFlags::NONE,
        }
    }

    #[must_use]
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    #[must_use]
    pub fn with_insecure_options(mut self, flags: SecFlags) -> Self {
        self.insecure_options = flags;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
