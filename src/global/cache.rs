use std::path::{Path, PathBuf};
use semver::Version;
use walkdir::WalkDir;
use crate::error::Result;

/// Name of the flattened, version-namespaced area inside a store directory.
pub const STORE_DIR_NAME: &str = ".store";

/// Returns the filesystem-safe cache key for a package name.
///
/// The scope separator is replaced, so `@acme/scaffold` becomes `@acme+scaffold`.
pub fn cache_key(name: &str) -> String {
    name.replace(['/', '\\'], "+")
}

/// Directory holding one installed version: `<store>/.store/<key>@<version>`.
pub fn version_dir(store_dir: &Path, name: &str, version: &Version) -> PathBuf {
    store_dir
        .join(STORE_DIR_NAME)
        .join(format!("{}@{}", cache_key(name), version))
}

/// Cache location of a package version inside a store directory.
///
/// `<store>/.store/<key>@<version>/node_modules/<name>`; pure, no I/O.
pub fn cache_path(store_dir: &Path, name: &str, version: &Version) -> PathBuf {
    let mut path = version_dir(store_dir, name, version).join("node_modules");
    for segment in name.split('/') {
        path.push(segment);
    }
    path
}

/// Lists the versions of `name` that are present in the store, highest first.
///
/// A missing store is not an error. Entries whose package directory is absent
/// (for example an interrupted extraction) are skipped.
pub fn cached_versions(store_dir: &Path, name: &str) -> Result<Vec<Version>> {
    let root = store_dir.join(STORE_DIR_NAME);
    if !root.exists() {
        return Ok(Vec::new());
    }
    let prefix = format!("{}@", cache_key(name));
    let mut versions = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some(raw) = file_name.strip_prefix(&prefix) else {
            continue;
        };
        let Ok(version) = Version::parse(raw) else {
            continue;
        };
        if cache_path(store_dir, name, &version).exists() {
            versions.push(version);
        }
    }
    versions.sort_by(|a, b| b.cmp(a));
    Ok(versions)
}
