use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;
use crate::error::{Error, Result};

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(@[a-z0-9~-][a-z0-9._~-]*/)?[a-z0-9~-][a-z0-9._~-]*$")
        .expect("package name pattern is valid")
});

/// Checks a registry package name against the npm naming rules.
///
/// Only lowercase URL-safe characters are allowed, with an optional `@scope/`
/// prefix. Names end up in URLs, store paths and child-process directives, so
/// anything else is rejected up front.
pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 214 {
        return Err(Error::Config(format!("invalid package name '{name}'")));
    }
    if !PACKAGE_NAME.is_match(name) {
        return Err(Error::Config(format!("invalid package name '{name}'")));
    }
    Ok(())
}

/// Anchors `path` at the current directory when relative and folds `.` and
/// `..` components without touching the filesystem.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Renders a path with forward slashes regardless of the host separator.
pub fn format_path(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '\\' {
        rendered.replace('\\', "/")
    } else {
        rendered.into_owned()
    }
}
