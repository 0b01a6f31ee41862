use std::io;
use std::path::PathBuf;
use std::process::{Command, Output};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::config::EngineConfig;
use crate::core::{EmptyResult, GenericError, GenericResult};

use super::{BackupEngine, BackupTask, EngineResult};

// The process may exit with zero status even when the backup hasn't actually been taken, so the
// completion marker on the last output line is authoritative.
const COMPLETION_MARKER: &str = "completed OK!";

pub struct XtraBackup {
    binary: String,
    defaults_file: Option<String>,
    options: Vec<String>,
    ping_command: Option<Vec<String>>,
}

impl XtraBackup {
    pub fn new(config: &EngineConfig) -> XtraBackup {
        XtraBackup {
            binary: config.binary.clone(),
            defaults_file: config.defaults_file.clone(),
            options: config.options.clone(),
            ping_command: config.ping_command.clone(),
        }
    }

    fn new_command(&self, binary: &str) -> Command {
        let mut command = Command::new(binary);

        // MySQL tools accept the defaults file only as the first argument
        if let Some(defaults_file) = self.defaults_file.as_ref() {
            command.arg(format!("--defaults-file={}", defaults_file));
        }

        command
    }
}

impl BackupEngine for XtraBackup {
    fn name(&self) -> &'static str {
        "xtrabackup"
    }

    fn check(&self) -> EmptyResult {
        let output = Command::new(&self.binary).arg("--version").output()
            .map_err(|e| spawn_error(&self.binary, e))?;

        if !output.status.success() {
            return Err!("{:?} binary is not functional: it exited with {}", self.binary, output.status);
        }

        if let Some(ping_command) = self.ping_command.as_ref() {
            let (binary, args) = ping_command.split_first().unwrap();

            let mut command = self.new_command(binary);
            command.args(args);

            debug!("Checking the database server availability with {:?}...", command);
            let output = command.output().map_err(|e| spawn_error(binary, e))?;

            if !output.status.success() {
                return Err!("The database server is not available: {}",
                            String::from_utf8_lossy(&output.stderr).trim());
            }
        }

        Ok(())
    }

    fn invoke(&self, task: &BackupTask) -> GenericResult<EngineResult> {
        let mut command = self.new_command(&self.binary);

        command.arg("--backup");
        command.arg(format!("--target-dir={}", task.target_path().display()));

        if let BackupTask::Incremental {base_path, ..} = *task {
            command.arg(format!("--incremental-basedir={}", base_path.display()));
        }

        command.args(&self.options);

        debug!("Executing {:?}...", command);
        let output = command.output().map_err(|e| spawn_error(&self.binary, e))?;

        Ok(parse_output(&output))
    }
}

// The engine reports its result only as free text, so the scrape is confined here: the rest of
// the program sees a typed result.
fn parse_output(output: &Output) -> EngineResult {
    lazy_static! {
        static ref ARTIFACT_PATH_RE: Regex = Regex::new(
            r"Backup created in directory '(?P<path>[^']+)'").unwrap();
    }

    // The engine writes its log to stderr keeping stdout for streaming modes which we don't use
    let log = if output.stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        String::from_utf8_lossy(&output.stderr).into_owned()
    };

    let success = log.lines().rev()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.contains(COMPLETION_MARKER));

    let artifact_path = if success {
        ARTIFACT_PATH_RE.captures(&log).map(|captures|
            PathBuf::from(captures.name("path").unwrap().as_str()))
    } else {
        None
    };

    EngineResult {success, artifact_path, output: log}
}

fn spawn_error(binary: &str, err: io::Error) -> GenericError {
    match err.kind() {
        io::ErrorKind::NotFound => format!("Unable to execute {:?}: the binary is not found", binary).into(),
        io::ErrorKind::PermissionDenied => format!("Unable to execute {:?}: permission denied", binary).into(),
        _ => format!("Unable to execute {:?}: {}", binary, err).into(),
    }
}
