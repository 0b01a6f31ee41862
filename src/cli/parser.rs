use clap::{Arg, ArgAction, ArgMatches, Command};
use const_format::formatcp;
use indoc::indoc;

use crate::core::GenericResult;

use super::Action;

pub struct Parser {
    matches: Option<ArgMatches>,
}

pub struct GlobalOptions {
    pub log_level: log::Level,
    pub config_path: String,
}

impl Parser {
    pub fn new() -> Parser {
        Parser {matches: None}
    }

    pub fn parse_global(&mut self) -> GenericResult<GlobalOptions> {
        const DEFAULT_CONFIG_PATH: &str = "~/.xbm.yaml";

        let matches = new_command("xbm", "XtraBackup chain manager")
            .version(env!("CARGO_PKG_VERSION"))

            .subcommand_required(true)
            .arg_required_else_help(true)
            .disable_help_subcommand(true)
            .help_expected(true)

            .arg(Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help(formatcp!("Configuration file path [default: {}]", DEFAULT_CONFIG_PATH)))

            .arg(Arg::new("cron")
                .long("cron")
                .action(ArgAction::SetTrue)
                .help("Show only warning and error messages (intended to be used from cron)"))

            .arg(Arg::new("verbose")
                .short('v').long("verbose")
                .conflicts_with("cron")
                .action(ArgAction::Count)
                .help("Set verbosity level"))

            .subcommand(new_command(
                "backup", "Create a full or incremental backup according to the chain state"))

            .subcommand(new_command(
                "list", "List backup chains in the backup root"))

            .subcommand(new_command(
                "prune", "Delete backup chains that outlived the retention policy"))

            .get_matches();

        let log_level = match matches.get_count("verbose") {
            0 => if matches.get_flag("cron") {
                log::Level::Warn
            } else {
                log::Level::Info
            },
            1 => log::Level::Debug,
            2 => log::Level::Trace,
            _ => return Err!("Invalid verbosity level"),
        };

        let config_path = matches.get_one::<String>("config").cloned().unwrap_or_else(||
            shellexpand::tilde(DEFAULT_CONFIG_PATH).to_string());

        self.matches.replace(matches);

        Ok(GlobalOptions {log_level, config_path})
    }

    pub fn parse(self) -> GenericResult<Action> {
        let (command, _matches) = self.matches.as_ref().unwrap().subcommand().unwrap();

        Ok(match command {
            "backup" => Action::Backup,
            "list" => Action::List,
            "prune" => Action::Prune,
            _ => unreachable!(),
        })
    }
}

fn new_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        // Default template contains `{bin} {version}` for some reason
        .help_template(indoc!("
            {before-help}{about}

            {usage-heading}
                {usage}

            {all-args}{after-help}\
        "))
        .about(about)
}
