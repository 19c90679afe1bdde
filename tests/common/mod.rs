//! On-disk pod fixtures shared by the integration tests.

#![allow(dead_code)]

use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const POD_A: &str = "6a7b1c2d-0000-4000-8000-000000000001";
pub const POD_B: &str = "6a7b9e8f-0000-4000-8000-000000000002";
pub const POD_C: &str = "c0ffee00-0000-4000-8000-000000000003";

pub const STAGE1_ID: &str = "deps-sha512-0123456789abcdef";

/// Pod manifest with the given `(app, image name)` pairs.
pub fn manifest_json(apps: &[(&str, Option<&str>)]) -> String {
    let apps: Vec<serde_json::Value> = apps
        .iter()
        .map(|(name, image)| {
            let mut image_json = serde_json::json!({
                "id": "sha512-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            });
            if let Some(image) = image {
                image_json["name"] = serde_json::Value::String(image.to_string());
            }
            serde_json::json!({ "name": name, "image": image_json })
        })
        .collect();
    serde_json::json!({
        "acKind": "PodManifest",
        "acVersion": "0.8.11",
        "apps": apps,
    })
    .to_string()
}

/// Creates `pods/<dir>/<id>/`, optionally with a pod manifest.
pub fn create_pod(data_dir: &Path, dir: &str, id: &str, manifest: Option<&str>) -> PathBuf {
    let path = data_dir.join("pods").join(dir).join(id);
    fs::create_dir_all(&path).unwrap();
    if let Some(manifest) = manifest {
        fs::write(path.join("pod"), manifest).unwrap();
    }
    path
}

/// Creates a pod in `run/` with PID 1, stage1 files and the given apps,
/// and returns the owner's lock that makes it running.
pub fn create_running_pod(data_dir: &Path, id: &str, apps: &[(&str, Option<&str>)]) -> (PathBuf, File) {
    let path = create_pod(data_dir, "run", id, Some(&manifest_json(apps)));
    fs::write(path.join("pid"), "4242\n").unwrap();
    fs::write(path.join("stage1TreeStoreID"), STAGE1_ID).unwrap();
    fs::create_dir_all(path.join("stage1")).unwrap();
    fs::write(
        path.join("stage1/manifest"),
        r#"{"name": "stage1", "annotations": [{"name": "coreos.com/rkt/stage1/enter", "value": "/enter"}]}"#,
    )
    .unwrap();
    let owner = hold_exclusive(&path);
    (path, owner)
}

/// Takes the exclusive lock an owning subsystem would hold.
pub fn hold_exclusive(path: &Path) -> File {
    let file = File::open(path).unwrap();
    FileExt::lock_exclusive(&file).unwrap();
    file
}
