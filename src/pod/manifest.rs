//! Pod and image manifests.
//!
//! Only the fields the control plane reads are modeled; everything else in
//! the JSON documents is ignored.

use crate::constants::{MAX_APP_NAME_LEN, MAX_MANIFEST_SIZE};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// =============================================================================
// App Name
// =============================================================================

/// Name of an app within a pod.
///
/// Lowercase alphanumeric segments joined by single `-`, e.g. `web` or
/// `etcd-proxy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidAppName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("empty"));
        }
        if name.len() > MAX_APP_NAME_LEN {
            return Err(invalid("too long"));
        }
        let valid = name.split('-').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        });
        if !valid {
            return Err(invalid(
                "must be lowercase alphanumeric segments separated by single dashes",
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AppName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AppName> for String {
    fn from(name: AppName) -> Self {
        name.0
    }
}

impl std::fmt::Display for AppName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Manifests
// =============================================================================

/// Name/value annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

/// Image reference of an app in a pod manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeImage {
    /// Image name, when recorded at preparation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Content key of the image.
    pub id: String,
}

/// App entry of a pod manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeApp {
    pub name: AppName,
    pub image: RuntimeImage,
}

/// Pod manifest (`<pod>/pod`). Fixed once preparation finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodManifest {
    #[serde(default)]
    pub ac_kind: String,
    #[serde(default)]
    pub ac_version: String,
    #[serde(default)]
    pub apps: Vec<RuntimeApp>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl PodManifest {
    /// Finds an app by name.
    pub fn app(&self, name: &AppName) -> Option<&RuntimeApp> {
        self.apps.iter().find(|app| &app.name == name)
    }

    pub fn app_names(&self) -> Vec<String> {
        self.apps.iter().map(|app| app.name.to_string()).collect()
    }
}

/// Image manifest, as stored for each app and for stage1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl ImageManifest {
    /// Value of the first annotation called `name`.
    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.annotations
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Reads and parses a JSON manifest, refusing oversized files.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let invalid = |reason: String| Error::InvalidManifest {
        path: path.to_path_buf(),
        reason,
    };
    let meta = fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
    if meta.len() > MAX_MANIFEST_SIZE {
        return Err(invalid(format!(
            "manifest is {} bytes, limit is {}",
            meta.len(),
            MAX_MANIFEST_SIZE
        )));
    }
    let data = fs::read(path).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_slice(&data).map_err(|e| invalid(e.to_string()))
}
