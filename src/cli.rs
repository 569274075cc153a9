use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Enable debug logging
    #[clap(short, long, global = true)]
    pub(crate) debug: bool,
    /// Run the command package from this local directory instead of the cache
    #[clap(short = 't', long, global = true, env = "HOIST_TARGET_PATH")]
    pub(crate) target_path: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: HoistCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum HoistCommand {
    /// Initializes a new project with the init package
    Init {
        /// Name of the project to create
        project_name: Option<String>,
        /// Initialize even if the current directory is not empty
        #[clap(short, long)]
        force: bool,
    },
    /// Any other command configured in `commands.toml`
    #[command(external_subcommand)]
    External(Vec<String>),
}
