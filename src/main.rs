mod cli;
mod execute;
mod logging;

use clap::Parser;
use colored::Colorize;
use crate::cli::CLI;

fn main() {
    let cli = CLI::parse();
    logging::init(cli.debug);
    match execute::execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    }
}
