use std::path::{Path, PathBuf};
use crate::error::Result;
use crate::global::utils::{get_cli_home, get_dependency_dirs, get_user_home};
use crate::registry::DEFAULT_REGISTRY;

pub const HOME_ENV: &str = "HOIST_HOME";
pub const TARGET_PATH_ENV: &str = "HOIST_TARGET_PATH";
pub const STORE_DIR_ENV: &str = "HOIST_STORE_DIR";
pub const REGISTRY_ENV: &str = "HOIST_REGISTRY";
pub const RUNTIME_ENV: &str = "HOIST_RUNTIME";

/// Program used to run package entry points when `HOIST_RUNTIME` is unset.
pub const DEFAULT_RUNTIME: &str = "node";

/// How the runtime program is told what to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStyle {
    /// `<program> -e "<require entry and call it with the arguments>"`.
    Eval,
    /// `<program> <entry> <arguments-json>`.
    Script,
}

/// The external program that executes package entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    pub program: String,
    pub style: RuntimeStyle,
}

impl Runtime {
    /// Node-like programs get [`RuntimeStyle::Eval`], everything else [`RuntimeStyle::Script`].
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let stem = Path::new(&program)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let style = if stem.starts_with("node") {
            RuntimeStyle::Eval
        } else {
            RuntimeStyle::Script
        };
        Self { program, style }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new(DEFAULT_RUNTIME)
    }
}

/// Settings for one hoist invocation, built once at startup and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of hoist's own files (`~/.hoist` by default).
    pub cli_home: PathBuf,
    /// Local package directory that replaces the cached package.
    pub target_path: Option<PathBuf>,
    /// Store directory replacing `<cli_home>/dependencies/node_modules`.
    pub store_dir: Option<PathBuf>,
    pub registry: String,
    pub runtime: Runtime,
}

/// Raw configuration inputs, typically CLI flags layered over the environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigInputs {
    pub home: Option<String>,
    pub target_path: Option<String>,
    pub store_dir: Option<String>,
    pub registry: Option<String>,
    pub runtime: Option<String>,
}

impl ConfigInputs {
    /// Reads every `HOIST_*` variable from the process environment.
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|value| !value.trim().is_empty());
        Self {
            home: var(HOME_ENV),
            target_path: var(TARGET_PATH_ENV),
            store_dir: var(STORE_DIR_ENV),
            registry: var(REGISTRY_ENV),
            runtime: var(RUNTIME_ENV),
        }
    }
}

impl Config {
    /// Builds the configuration from the user home and raw inputs.
    pub fn from_inputs(user_home: &Path, inputs: ConfigInputs) -> Self {
        let cli_home = get_cli_home(user_home, inputs.home.as_deref());
        Self {
            cli_home,
            target_path: inputs.target_path.filter(|p| !p.trim().is_empty()).map(PathBuf::from),
            store_dir: inputs.store_dir.map(PathBuf::from),
            registry: inputs.registry.unwrap_or_else(|| DEFAULT_REGISTRY.to_string()),
            runtime: inputs.runtime.map(Runtime::new).unwrap_or_default(),
        }
    }

    /// Resolves the user home (which must exist) and builds the configuration.
    pub fn load(inputs: ConfigInputs) -> Result<Self> {
        let home = get_user_home()?;
        Ok(Self::from_inputs(&home, inputs))
    }

    /// `(target_path, store_dir)` used for cached command packages.
    pub fn dependency_dirs(&self) -> (PathBuf, PathBuf) {
        let (target, store) = get_dependency_dirs(&self.cli_home);
        (target, self.store_dir.clone().unwrap_or(store))
    }

    pub fn commands_file(&self) -> PathBuf {
        self.cli_home.join(crate::commands::COMMANDS_FILE)
    }
}
