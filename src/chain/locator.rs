use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{error, warn};

use crate::core::{EmptyResult, GenericResult};

use super::naming;
use super::{Chain, FullBackupSet, IncrementalBackupSet};

const FULL_NAMESPACE: &str = "full";
const INCREMENTAL_NAMESPACE: &str = "incr";

/// The backup root directory.
///
/// Chain state is never persisted anywhere else: it's derived from the directory listings on
/// every run, which keeps the scheduler stateless and tolerant to killed runs.
///
/// Layout:
/// ```text
/// <root>/full/<name>/           one full backup set
/// <root>/incr/<name>/<name>/    incremental sets owned by a full set
/// ```
pub struct BackupRoot {
    path: PathBuf,
}

impl BackupRoot {
    pub fn new<P: Into<PathBuf>>(path: P) -> BackupRoot {
        BackupRoot {path: path.into()}
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn check(&self) -> EmptyResult {
        if !self.path.is_dir() {
            return Err!("{:?} backup root doesn't exist", self.path);
        }
        Ok(())
    }

    pub fn prepare(&self) -> EmptyResult {
        for namespace in [FULL_NAMESPACE, INCREMENTAL_NAMESPACE] {
            let path = self.path.join(namespace);
            fs::create_dir_all(&path).map_err(|e| format!(
                "Unable to create {:?}: {}", path, e))?;
        }
        Ok(())
    }

    pub fn full_namespace_path(&self) -> PathBuf {
        self.path.join(FULL_NAMESPACE)
    }

    pub fn incremental_dir(&self, full_name: &str) -> PathBuf {
        self.path.join(INCREMENTAL_NAMESPACE).join(full_name)
    }

    pub fn list_full(&self) -> GenericResult<(Vec<FullBackupSet>, bool)> {
        self.check()?;

        let mut sets = Vec::new();
        let path = self.full_namespace_path();

        let (entries, ok) = self.list_sets(&path)?;
        for (name, created) in entries {
            let set_path = path.join(&name);
            sets.push(FullBackupSet {name, path: set_path, created});
        }

        Ok((sets, ok))
    }

    pub fn list_incremental(&self, full: &FullBackupSet) -> GenericResult<(Vec<IncrementalBackupSet>, bool)> {
        let mut sets = Vec::new();
        let path = self.incremental_dir(&full.name);

        let (entries, ok) = self.list_sets(&path)?;
        for (name, created) in entries {
            let set_path = path.join(&name);
            sets.push(IncrementalBackupSet {
                name, path: set_path,
                full_name: full.name.clone(),
                created,
            });
        }

        Ok((sets, ok))
    }

    pub fn locate_latest_full(&self) -> GenericResult<(Option<FullBackupSet>, bool)> {
        let (mut sets, ok) = self.list_full()?;
        Ok((sets.pop(), ok))
    }

    pub fn locate_latest_incremental(&self, full: &FullBackupSet) -> GenericResult<(Option<IncrementalBackupSet>, bool)> {
        let (mut sets, ok) = self.list_incremental(full)?;
        Ok((sets.pop(), ok))
    }

    pub fn list_chains(&self) -> GenericResult<(Vec<Chain>, bool)> {
        let (fulls, mut ok) = self.list_full()?;

        let mut chains = Vec::with_capacity(fulls.len());
        for full in fulls {
            let (incrementals, incrementals_ok) = self.list_incremental(&full)?;
            ok &= incrementals_ok;
            chains.push(Chain {full, incrementals});
        }

        Ok((chains, ok))
    }

    /// Lists per-full-set subdirectories of the incremental namespace without descending into
    /// them. Used by the pruner to find incrementals orphaned by an interrupted deletion.
    pub fn list_incremental_namespaces(&self) -> GenericResult<(Vec<(String, PathBuf)>, bool)> {
        let mut ok = true;
        let mut namespaces = Vec::new();
        let path = self.path.join(INCREMENTAL_NAMESPACE);

        let mut files = match list_directory(&path)? {
            Some(files) => files,
            None => return Ok((namespaces, ok)),
        };
        files.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, metadata) in files {
            if naming::is_temporary_name(&name) {
                continue;
            }

            let is_directory = metadata.map(|metadata| metadata.is_dir()).unwrap_or(false);
            if !is_directory || !naming::is_set_name(&name) {
                error!("{:?} contains an unexpected entry: {:?}.", path, name);
                ok = false;
                continue;
            }

            let namespace_path = path.join(&name);
            namespaces.push((name, namespace_path));
        }

        Ok((namespaces, ok))
    }

    fn list_sets(&self, path: &Path) -> GenericResult<(Vec<(String, SystemTime)>, bool)> {
        let mut ok = true;
        let mut sets = Vec::new();

        let mut files = match list_directory(path)? {
            Some(files) => files,
            None => return Ok((sets, ok)),
        };
        files.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, metadata) in files {
            if naming::is_temporary_name(&name) {
                continue;
            }

            let metadata = match metadata {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("Unable to get metadata of {:?}: {}. Treating the backup set as not created yet.",
                          path.join(&name), err);
                    continue;
                },
            };

            if !metadata.is_dir() || !naming::is_set_name(&name) {
                error!("{:?} contains an unexpected entry: {:?}.", path, name);
                ok = false;
                continue;
            }

            let created = match metadata.modified() {
                Ok(time) => time,
                Err(err) => {
                    warn!("Unable to get modification time of {:?}: {}. Treating the backup set as not created yet.",
                          path.join(&name), err);
                    continue;
                },
            };

            sets.push((name, created));
        }

        Ok((sets, ok))
    }
}

fn list_directory(path: &Path) -> GenericResult<Option<Vec<(String, io::Result<fs::Metadata>)>>> {
    let entries = fs::read_dir(path);

    if let Err(ref err) = entries {
        if err.kind() == io::ErrorKind::NotFound {
            return Ok(None);
        }
    }

    let mut files = Vec::new();

    for entry in entries? {
        let entry = entry?;

        let file_name = entry.file_name().into_string().map_err(|file_name| format!(
            "Got an invalid file name: {:?}", file_name.to_string_lossy()))?;

        files.push((file_name, entry.metadata()));
    }

    Ok(Some(files))
}
