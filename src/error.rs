use std::path::PathBuf;

/// Errors produced while resolving, caching and dispatching a command package.
///
/// The binary reports every variant as a single message and exits non-zero;
/// nothing below the top-level command boundary retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown command mapping, malformed descriptor or bad configuration value.
    #[error("configuration error: {0}")]
    Config(String),
    /// Transport failure, timeout or unexpected status from the registry.
    #[error("registry error: {0}")]
    Registry(String),
    /// The registry knows no version of the package that satisfies the request.
    #[error("no published version of {name} satisfies '{requested}'")]
    UnknownPackage { name: String, requested: String },
    /// The install collaborator reported a failure.
    #[error("failed to install {name}@{version}: {reason}")]
    Install {
        name: String,
        version: String,
        reason: String,
    },
    /// No manifest or no declared entry under the package root.
    #[error("missing entry point for package at {}", .0.display())]
    EntryPoint(PathBuf),
    /// A manifest exists but could not be read or parsed.
    #[error("invalid manifest {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },
    /// The runtime program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The invocation could not be turned into a runtime directive.
    #[error("dispatch failed: {0}")]
    Dispatch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn registry(msg: impl Into<String>) -> Self {
        Error::Registry(msg.into())
    }

    pub(crate) fn install(name: &str, version: &impl ToString, reason: impl ToString) -> Self {
        Error::Install {
            name: name.to_string(),
            version: version.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure came from talking to the registry, as opposed to
    /// the registry answering that nothing matches.
    pub fn is_registry(&self) -> bool {
        matches!(self, Error::Registry(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Registry(format!("request timed out: {err}"))
        } else {
            Error::Registry(err.to_string())
        }
    }
}
