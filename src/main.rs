#[macro_use] mod core;

mod backuping;
mod chain;
mod cli;
mod config;
mod engine;
mod listing;
mod metrics;
mod pruning;
mod scheduling;
#[cfg(test)] mod tests;
mod util;

use std::io::{self, Write};
use std::process;

use log::error;

use crate::cli::{Action, Parser};
use crate::config::Config;
use crate::core::GenericResult;

fn main() {
    let mut parser = Parser::new();

    let global = parser.parse_global().unwrap_or_else(|e| {
        let _ = writeln!(io::stderr(), "Command line argument error: {}.", e);
        process::exit(1);
    });

    if let Err(e) = easy_logging::init(module_path!(), global.log_level) {
        let _ = writeln!(io::stderr(), "Failed to initialize the logging: {}.", e);
        process::exit(1);
    }

    let config = Config::load(&global.config_path).unwrap_or_else(|e| {
        error!("Error while reading {:?} configuration file: {}.", global.config_path, e);
        process::exit(1);
    });

    let action = parser.parse().unwrap_or_else(|e| {
        error!("Command line argument error: {}.", e);
        process::exit(1);
    });

    let ok = run(action, &config).unwrap_or_else(|e| {
        error!("{}.", e);
        false
    });

    process::exit(if ok {0} else {1});
}

fn run(action: Action, config: &Config) -> GenericResult<bool> {
    match action {
        Action::Backup => backuping::backup(config),
        Action::List => listing::list(config),
        Action::Prune => pruning::run(config),
    }
}
