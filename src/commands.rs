use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::package::RequestedVersion;

/// File in the CLI home that extends the built-in command table.
pub const COMMANDS_FILE: &str = "commands.toml";

/// Package behind the built-in `init` command.
pub const DEFAULT_INIT_PACKAGE: &str = "@hoist/init";

/// A command table entry: either a bare package name or a package with a version request.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandEntry {
    Package(String),
    Detailed {
        package: String,
        #[serde(default)]
        version: Option<String>,
    },
}

impl CommandEntry {
    pub fn package(&self) -> &str {
        match self {
            CommandEntry::Package(package) => package,
            CommandEntry::Detailed { package, .. } => package,
        }
    }

    /// The version this command asks for, `latest` unless configured.
    pub fn requested_version(&self) -> Result<RequestedVersion> {
        match self {
            CommandEntry::Detailed { version: Some(version), .. } => RequestedVersion::parse(version),
            _ => Ok(RequestedVersion::Latest),
        }
    }
}

/// Maps logical command names to the packages that implement them.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    #[serde(default)]
    pub commands: BTreeMap<String, CommandEntry>,
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("init".to_string(), CommandEntry::Package(DEFAULT_INIT_PACKAGE.to_string()));
        CommandTable { commands }
    }
}

impl CommandTable {
    /// Loads a command table from a TOML file.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<CommandTable> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("could not read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("could not parse {}: {e}", path.display())))
    }

    /// The built-in table, extended and overridden by `path` when it exists.
    pub fn load_with_defaults<P: AsRef<Path>>(path: P) -> Result<CommandTable> {
        let mut table = CommandTable::default();
        if path.as_ref().exists() {
            table.merge(CommandTable::load(path)?);
        }
        Ok(table)
    }

    /// Adds every entry of `other`, replacing entries with the same name.
    pub fn merge(&mut self, other: CommandTable) {
        self.commands.extend(other.commands);
    }

    pub fn get(&self, command: &str) -> Option<&CommandEntry> {
        self.commands.get(command)
    }

    /// Looks a command up, failing with the list of known commands.
    pub fn lookup(&self, command: &str) -> Result<&CommandEntry> {
        self.get(command).ok_or_else(|| {
            Error::Config(format!(
                "unknown command '{command}'; available commands: {}",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;
    use tempfile::tempdir;

    #[test]
    fn test_default_table_has_init() {
        let table = CommandTable::default();
        assert_eq!(table.lookup("init").unwrap().package(), DEFAULT_INIT_PACKAGE);
    }

    #[test]
    fn test_unknown_command_lists_available() {
        let err = CommandTable::default().lookup("deploy").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown command 'deploy'"));
        assert!(message.contains("init"));
    }

    #[test]
    fn test_load_with_defaults_merges_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(COMMANDS_FILE);
        std::fs::write(
            &path,
            r#"
[commands]
init = "scaffold-tool"
lint = { package = "@acme/lint", version = "^2.1.0" }
"#,
        )
        .unwrap();
        let table = CommandTable::load_with_defaults(&path).unwrap();
        assert_eq!(table.lookup("init").unwrap().package(), "scaffold-tool");
        let lint = table.lookup("lint").unwrap();
        assert_eq!(lint.package(), "@acme/lint");
        assert_eq!(
            lint.requested_version().unwrap(),
            RequestedVersion::Compatible(Version::parse("2.1.0").unwrap())
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let table = CommandTable::load_with_defaults(dir.path().join(COMMANDS_FILE)).unwrap();
        assert_eq!(table, CommandTable::default());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(COMMANDS_FILE);
        std::fs::write(&path, "[commands\ninit = ").unwrap();
        assert!(matches!(CommandTable::load_with_defaults(&path), Err(Error::Config(_))));
    }
}
