use std::path::{Path, PathBuf};
use directories::BaseDirs;
use crate::error::{Error, Result};

/// Directory name of the CLI home under the user home when `HOIST_HOME` is unset.
pub const DEFAULT_CLI_HOME: &str = ".hoist";

/// Subdirectory of the CLI home that holds cached command packages.
pub const DEPENDENCIES_DIR: &str = "dependencies";

/// Returns the current user's home directory, verifying that it exists.
pub fn get_user_home() -> Result<PathBuf> {
    let dirs = BaseDirs::new()
        .ok_or_else(|| Error::Config("could not determine the user home directory".to_string()))?;
    let home = dirs.home_dir().to_path_buf();
    if !home.is_dir() {
        return Err(Error::Config(format!(
            "user home directory {} does not exist",
            home.display()
        )));
    }
    Ok(home)
}

/// Derives the CLI home from the user home and an optional `HOIST_HOME` value.
///
/// Relative values are taken relative to the user home, absolute ones are used as is.
pub fn get_cli_home(user_home: &Path, override_dir: Option<&str>) -> PathBuf {
    match override_dir.filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => user_home.join(dir),
        None => user_home.join(DEFAULT_CLI_HOME),
    }
}

/// Returns `(target_path, store_dir)` for cached command packages under `cli_home`.
pub fn get_dependency_dirs(cli_home: &Path) -> (PathBuf, PathBuf) {
    let target = cli_home.join(DEPENDENCIES_DIR);
    let store = target.join("node_modules");
    (target, store)
}
