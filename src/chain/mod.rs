mod locator;
pub mod naming;

use std::path::PathBuf;
use std::time::SystemTime;

pub use self::locator::BackupRoot;

/// A complete, self-sufficient snapshot which roots a backup chain.
///
/// The name doubles as the directory name and the sort key. The creation time is taken from the
/// directory modification time rather than parsed from the name: the engine may spend a while
/// populating the directory, and expiry is counted from the actual completion.
pub struct FullBackupSet {
    pub name: String,
    pub path: PathBuf,
    pub created: SystemTime,
}

/// A delta against the previous set in the chain.
pub struct IncrementalBackupSet {
    pub name: String,
    pub path: PathBuf,
    pub full_name: String,
    pub created: SystemTime,
}

/// A full backup set plus its incrementals ordered by name.
///
/// The base of each incremental is the previous incremental or, for the first one, the full set
/// itself.
pub struct Chain {
    pub full: FullBackupSet,
    pub incrementals: Vec<IncrementalBackupSet>,
}
