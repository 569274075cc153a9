//! Command dispatch: from a command name to a running entry point.
//!
//! A dispatch walks through [`Stage`]s in order. Cached packages are resolved,
//! installed or updated in the store and then handed to a [`Launcher`] with
//! the live [`CommandInvocation`]. A configured override path skips the store
//! entirely and runs the entry in an isolated child process instead, which
//! only ever sees a sanitized JSON copy of the arguments.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use serde_json::Value;
use crate::commands::CommandTable;
use crate::config::{Config, Runtime, RuntimeStyle};
use crate::error::{Error, Result};
use crate::installer::Installer;
use crate::invocation::CommandInvocation;
use crate::manifest::find_entry_point;
use crate::package::{PackageCache, PackageDescriptor, RequestedVersion};
use crate::registry::VersionSource;

/// Exit code reported when a child ends without one, e.g. killed by a signal.
pub const FALLBACK_EXIT_CODE: i32 = 1;

/// Steps of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Resolving,
    Ensuring,
    Locating,
    Dispatching,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Resolving => "resolving",
            Stage::Ensuring => "ensuring",
            Stage::Locating => "locating",
            Stage::Dispatching => "dispatching",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a successful dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The entry point ran through the [`Launcher`], which reported `code`.
    Completed { entry: PathBuf, code: i32 },
    /// The entry point ran in a child process that exited with `code`.
    Exited { entry: PathBuf, code: i32 },
}

impl Outcome {
    /// The exit code the hoist process should end with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed { code, .. } | Outcome::Exited { code, .. } => *code,
        }
    }

    pub fn entry(&self) -> &Path {
        match self {
            Outcome::Completed { entry, .. } | Outcome::Exited { entry, .. } => entry,
        }
    }
}

/// Runs a located entry point with the live invocation.
pub trait Launcher {
    /// Returns the exit code the entry point finished with.
    fn launch(&self, entry: &Path, invocation: &CommandInvocation) -> Result<i32>;
}

/// Runs entry points with the configured runtime in the foreground.
///
/// A JavaScript entry cannot be loaded into the hoist process itself, so the
/// runtime is attached to the terminal and waited on. Its exit code becomes
/// the exit code of the dispatch.
#[derive(Debug, Clone)]
pub struct InterpreterLauncher {
    runtime: Runtime,
}

impl InterpreterLauncher {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }
}

impl Launcher for InterpreterLauncher {
    fn launch(&self, entry: &Path, invocation: &CommandInvocation) -> Result<i32> {
        let status = run_directive(&self.runtime, entry, &invocation.sanitized())?;
        let code = status_code(status);
        if code != 0 {
            tracing::debug!(command = invocation.name(), code, "runtime exited unsuccessfully");
        }
        Ok(code)
    }
}

/// Builds the argument list that makes `runtime` run `entry` with `args`.
///
/// The entry path and the arguments are embedded only as JSON literals.
pub fn build_directive(runtime: &Runtime, entry: &Path, args: &[Value]) -> Result<Vec<String>> {
    let entry = crate::util::format_path(entry);
    let args_json = serde_json::to_string(args)
        .map_err(|e| Error::Dispatch(format!("could not serialize arguments: {e}")))?;
    Ok(match runtime.style {
        RuntimeStyle::Eval => {
            let entry_literal = serde_json::to_string(&entry)
                .map_err(|e| Error::Dispatch(format!("could not encode entry path: {e}")))?;
            vec![
                "-e".to_string(),
                format!("require({entry_literal}).call(null, {args_json})"),
            ]
        }
        RuntimeStyle::Script => vec![entry, args_json],
    })
}

/// Spawns `runtime` with inherited stdio in the current directory and waits for it.
fn run_directive(runtime: &Runtime, entry: &Path, args: &[Value]) -> Result<ExitStatus> {
    let directive = build_directive(runtime, entry, args)?;
    let mut command = spawn_command(&runtime.program, &directive);
    command.current_dir(std::env::current_dir()?);
    tracing::debug!(program = %runtime.program, ?directive, "spawning runtime");
    let mut child = command.spawn().map_err(|source| Error::Spawn {
        program: runtime.program.clone(),
        source,
    })?;
    Ok(child.wait()?)
}

#[cfg(windows)]
fn spawn_command(program: &str, args: &[String]) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/c").arg(program).args(args);
    command
}

#[cfg(not(windows))]
fn spawn_command(program: &str, args: &[String]) -> Command {
    let mut command = Command::new(program);
    command.args(args);
    command
}

fn status_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(FALLBACK_EXIT_CODE)
}

/// Resolves command names to packages and runs them.
pub struct Dispatcher<'a> {
    config: &'a Config,
    commands: &'a CommandTable,
    source: &'a dyn VersionSource,
    installer: &'a dyn Installer,
    launcher: &'a dyn Launcher,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        config: &'a Config,
        commands: &'a CommandTable,
        source: &'a dyn VersionSource,
        installer: &'a dyn Installer,
        launcher: &'a dyn Launcher,
    ) -> Self {
        Self {
            config,
            commands,
            source,
            installer,
            launcher,
        }
    }

    /// Dispatches one invocation to the package behind its command name.
    ///
    /// # Errors
    ///
    /// Fails on an unknown command before any network or filesystem access,
    /// and on any resolve, install, locate or spawn failure after that.
    pub fn dispatch(&self, invocation: &CommandInvocation) -> Result<Outcome> {
        enter(Stage::Start, invocation.name());
        let result = self.run(invocation);
        match &result {
            Ok(outcome) => {
                tracing::debug!(stage = %Stage::Done, command = invocation.name(), code = outcome.exit_code(), "dispatch finished");
            }
            Err(err) => {
                tracing::debug!(stage = %Stage::Failed, command = invocation.name(), error = %err, "dispatch failed");
            }
        }
        result
    }

    fn run(&self, invocation: &CommandInvocation) -> Result<Outcome> {
        enter(Stage::Resolving, invocation.name());
        let descriptor = self.descriptor_for(invocation.name())?;

        let location = match &self.config.target_path {
            Some(_) => descriptor.target_path().to_path_buf(),
            None => {
                enter(Stage::Ensuring, invocation.name());
                self.ensure(&descriptor)?
            }
        };

        enter(Stage::Locating, invocation.name());
        let entry = find_entry_point(&location)?.ok_or(Error::EntryPoint(location))?;

        enter(Stage::Dispatching, invocation.name());
        if self.config.target_path.is_some() {
            let status = run_directive(&self.config.runtime, &entry, &invocation.sanitized())?;
            let code = status_code(status);
            tracing::debug!(code, "child exited");
            Ok(Outcome::Exited { entry, code })
        } else {
            let code = self.launcher.launch(&entry, invocation)?;
            Ok(Outcome::Completed { entry, code })
        }
    }

    /// Builds the descriptor for `command`, pointing at the override path when one is set.
    pub fn descriptor_for(&self, command: &str) -> Result<PackageDescriptor> {
        let entry = self.commands.lookup(command)?;
        match &self.config.target_path {
            Some(target) => {
                tracing::debug!(target_path = %target.display(), "using local override path");
                PackageDescriptor::new(entry.package(), RequestedVersion::Latest, target.clone(), None)
            }
            None => {
                let (target, store) = self.config.dependency_dirs();
                tracing::debug!(target_path = %target.display(), store_dir = %store.display(), "using package store");
                PackageDescriptor::new(entry.package(), entry.requested_version()?, target, Some(store))
            }
        }
    }

    /// Makes sure the package is in the store and returns its location.
    fn ensure(&self, descriptor: &PackageDescriptor) -> Result<PathBuf> {
        let cache = PackageCache::new(self.source, self.installer, &self.config.registry);
        let (resolved, present) = cache.exists(descriptor)?;
        let current = if present {
            cache.update(descriptor)?
        } else {
            tracing::info!(package = %resolved, "installing");
            cache.install(&resolved)?
        };
        current
            .location()
            .ok_or_else(|| Error::Config(format!("{current} has no resolved location")))
    }
}

fn enter(stage: Stage, command: &str) {
    tracing::debug!(%stage, command, "dispatch stage");
}
