use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::error::{Error, Result};
use crate::util::{absolutize, format_path};

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// The manifest fields hoist reads.
#[derive(Debug, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Entry file, relative to the manifest directory.
    #[serde(default)]
    pub main: Option<String>,
}

impl PackageManifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PackageManifest> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Returns the nearest directory at or above `start` that contains a manifest.
pub fn find_package_dir(start: &Path) -> Option<&Path> {
    start
        .ancestors()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
}

/// Resolves the runnable entry file of the package containing `root`.
///
/// The result is absolute, free of `.`/`..` and uses forward slashes.
/// `Ok(None)` when there is no manifest or it declares no `main`.
///
/// # Errors
///
/// [`Error::Manifest`] if a manifest exists but cannot be read or parsed.
pub fn find_entry_point(root: &Path) -> Result<Option<PathBuf>> {
    let root = absolutize(root)?;
    let Some(dir) = find_package_dir(&root) else {
        tracing::debug!(root = %root.display(), "no manifest found");
        return Ok(None);
    };
    let manifest = PackageManifest::load(dir.join(MANIFEST_FILE))?;
    tracing::debug!(
        package = manifest.name.as_deref().unwrap_or("<unnamed>"),
        version = manifest.version.as_deref().unwrap_or("<none>"),
        dir = %dir.display(),
        "loaded manifest"
    );
    let Some(main) = manifest.main.filter(|main| !main.trim().is_empty()) else {
        return Ok(None);
    };
    let entry = absolutize(&dir.join(main))?;
    Ok(Some(PathBuf::from(format_path(&entry))))
}
