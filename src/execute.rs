use anyhow::{Context, Result};
use colored::Colorize;
use semver::Version;
use serde_json::{Map, Value};
use hoist::commands::CommandTable;
use hoist::config::{Config, ConfigInputs};
use hoist::dispatch::{Dispatcher, InterpreterLauncher};
use hoist::installer::TarballInstaller;
use hoist::invocation::CommandInvocation;
use hoist::registry::{CLI_PACKAGE, RegistryClient, VersionSource, newer_compatible};
use crate::cli::{HoistCommand, CLI};

/// Runs the parsed command line and returns the exit code for the process.
pub fn execute(cli: CLI) -> Result<i32> {
    let mut inputs = ConfigInputs::from_env();
    if let Some(target) = &cli.target_path {
        inputs.target_path = Some(target.to_string_lossy().into_owned());
    }
    let config = Config::load(inputs).context("could not load configuration")?;
    tracing::debug!(cli_home = %config.cli_home.display(), registry = %config.registry, "configuration loaded");

    let commands = CommandTable::load_with_defaults(config.commands_file())?;
    let invocation = build_invocation(&cli)?;

    let registry = RegistryClient::new(&config.registry)?;
    check_cli_update(&registry);
    let installer = TarballInstaller;
    let launcher = InterpreterLauncher::new(config.runtime.clone());
    let dispatcher = Dispatcher::new(&config, &commands, &registry, &installer, &launcher);

    let outcome = dispatcher
        .dispatch(&invocation)
        .with_context(|| format!("command '{}' failed", invocation.name()))?;
    tracing::debug!(entry = %outcome.entry().display(), code = outcome.exit_code(), "command finished");
    Ok(outcome.exit_code())
}

/// Warns when a newer compatible release of hoist itself is published.
///
/// Never fails the command: registry problems are only logged at debug level.
fn check_cli_update(source: &dyn VersionSource) {
    let current = match Version::parse(env!("CARGO_PKG_VERSION")) {
        Ok(current) => current,
        Err(err) => {
            tracing::debug!(error = %err, "unparsable hoist version, skipping update check");
            return;
        }
    };
    match newer_compatible(source, CLI_PACKAGE, &current) {
        Ok(Some(latest)) => tracing::warn!(
            "{}",
            format!(
                "{CLI_PACKAGE} {current} is outdated, {latest} is available. Update with: npm install -g {CLI_PACKAGE}"
            )
            .yellow()
        ),
        Ok(None) => tracing::debug!(%current, "hoist is up to date"),
        Err(err) => tracing::debug!(error = %err, "update check failed"),
    }
}

/// Turns the parsed command line into positional arguments plus an options record.
///
/// The record also carries the command name under `_name` and the global
/// options under `parent`; both stay out of anything sent to a child process.
pub fn build_invocation(cli: &CLI) -> Result<CommandInvocation> {
    let mut parent = Map::new();
    parent.insert("debug".into(), Value::Bool(cli.debug));
    if let Some(target) = &cli.target_path {
        parent.insert("targetPath".into(), Value::String(target.to_string_lossy().into_owned()));
    }

    let (name, positional, mut options) = match &cli.command {
        HoistCommand::Init { project_name, force } => {
            let mut options = Map::new();
            options.insert("force".into(), Value::Bool(*force));
            let project = project_name.clone().map(Value::String).unwrap_or(Value::Null);
            ("init".to_string(), vec![project], options)
        }
        HoistCommand::External(args) => {
            let (name, rest) = args
                .split_first()
                .context("missing command name")?;
            let (positional, options) = split_external_args(rest);
            (name.clone(), positional, options)
        }
    };
    options.insert("_name".into(), Value::String(name.clone()));
    options.insert("parent".into(), Value::Object(parent));
    Ok(CommandInvocation::from_parts(name, positional, options))
}

/// `--key=value` and `--flag` become options, everything else is positional.
fn split_external_args(args: &[String]) -> (Vec<Value>, Map<String, Value>) {
    let mut positional = Vec::new();
    let mut options = Map::new();
    for arg in args {
        match arg.strip_prefix("--").filter(|rest| !rest.is_empty()) {
            Some(flag) => match flag.split_once('=') {
                Some((key, value)) => {
                    options.insert(key.to_string(), Value::String(value.to_string()));
                }
                None => {
                    options.insert(flag.to_string(), Value::Bool(true));
                }
            },
            None => positional.push(Value::String(arg.clone())),
        }
    }
    (positional, options)
}
