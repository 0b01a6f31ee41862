mod xtrabackup;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::{EmptyResult, GenericResult};

pub use self::xtrabackup::XtraBackup;

#[derive(Clone, Copy, PartialEq)]
pub enum BackupType {
    Full,
    Incremental,
}

impl fmt::Display for BackupType {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(match self {
            BackupType::Full => "full",
            BackupType::Incremental => "incremental",
        })
    }
}

pub enum BackupTask<'a> {
    Full {
        target_path: &'a Path,
    },
    Incremental {
        target_path: &'a Path,
        base_path: &'a Path,
    },
}

impl BackupTask<'_> {
    pub fn type_(&self) -> BackupType {
        match self {
            BackupTask::Full {..} => BackupType::Full,
            BackupTask::Incremental {..} => BackupType::Incremental,
        }
    }

    pub fn target_path(&self) -> &Path {
        match self {
            BackupTask::Full {target_path} => target_path,
            BackupTask::Incremental {target_path, ..} => target_path,
        }
    }
}

/// The outcome of one engine invocation.
///
/// Success is what the engine reported through its output log, not the process exit status: the
/// log is authoritative, and the raw output is kept around for diagnostics on failure.
pub struct EngineResult {
    pub success: bool,
    pub artifact_path: Option<PathBuf>,
    pub output: String,
}

/// The external tool which performs the actual data copy / apply-log operations.
///
/// The scheduler issues exactly one invocation per run and never retries on failure: a partial
/// target directory may already exist, and blindly retrying risks corrupting the chain.
pub trait BackupEngine {
    fn name(&self) -> &'static str;

    /// Validates the run preconditions: the engine binary is executable and the database server
    /// accepts our credentials.
    fn check(&self) -> EmptyResult;

    fn invoke(&self, task: &BackupTask) -> GenericResult<EngineResult>;
}
