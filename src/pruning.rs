use std::collections::HashSet;
use std::fs;
use std::io;
use std::time::SystemTime;

use log::{debug, error, info};

use crate::chain::{BackupRoot, Chain};
use crate::config::{Config, RetentionPolicy};
use crate::core::{EmptyResult, GenericResult};
use crate::util;

pub fn run(config: &Config) -> GenericResult<bool> {
    let root = BackupRoot::new(&config.backup_root);
    root.check()?;

    let _lock = util::sys::acquire_lock(root.path())?;

    let (deleted, ok) = prune(&root, &config.retention, SystemTime::now())?;
    if deleted.is_empty() {
        info!("There are no expired backups.");
    }

    Ok(ok)
}

/// Deletes backup chains which outlived the retention policy.
///
/// A full backup set is expired once its directory modification age exceeds
/// `full_lifetime * keep_full_count` truncated to minutes. The arithmetic threshold is also what
/// protects the just-created set: its age is always below one lifetime.
pub fn prune(root: &BackupRoot, policy: &RetentionPolicy, now: SystemTime) -> GenericResult<(Vec<String>, bool)> {
    let mut deleted = Vec::new();
    let (chains, mut ok) = root.list_chains()?;

    if policy.keep_full_count == 0 {
        debug!("Backup pruning is disabled.");
        return Ok((deleted, ok));
    }

    if !ok {
        error!("Do not prune old backups due to errors above.");
        return Ok((deleted, ok));
    }

    let threshold_minutes = policy.full_lifetime.as_secs() * policy.keep_full_count as u64 / 60;

    for chain in &chains {
        let age_minutes = now.duration_since(chain.full.created).unwrap_or_default().as_secs() / 60;
        if age_minutes <= threshold_minutes {
            continue;
        }

        info!("Deleting {:?} backup chain...", chain.full.name);
        match delete_chain(root, chain) {
            Ok(()) => deleted.push(chain.full.name.clone()),
            Err(err) => {
                error!("Failed to delete {:?} backup chain: {}.", chain.full.name, err);
                ok = false;
            },
        }
    }

    // TODO: Collect stale temporary directories left by killed runs
    ok &= delete_orphaned_incrementals(root, &chains)?;

    Ok((deleted, ok))
}

fn delete_chain(root: &BackupRoot, chain: &Chain) -> EmptyResult {
    // Incrementals are always removed no later than their base full set, so a full set is never
    // observed absent while its incrementals remain
    let incremental_path = root.incremental_dir(&chain.full.name);
    match fs::remove_dir_all(&incremental_path) {
        Ok(()) => (),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (),
        Err(err) => return Err!("Unable to delete {:?}: {}", incremental_path, err),
    }

    fs::remove_dir_all(&chain.full.path).map_err(|e| format!(
        "Unable to delete {:?}: {}", chain.full.path, e))?;

    Ok(())
}

// Heals the state possibly left by a deletion interrupted between the incrementals and the full
// set removal
fn delete_orphaned_incrementals(root: &BackupRoot, chains: &[Chain]) -> GenericResult<bool> {
    let (namespaces, mut ok) = root.list_incremental_namespaces()?;
    let full_names: HashSet<&str> = chains.iter().map(|chain| chain.full.name.as_str()).collect();

    for (name, path) in namespaces {
        if full_names.contains(name.as_str()) {
            continue;
        }

        error!("{:?} contains incrementals of a nonexistent full backup. Deleting...", path);
        if let Err(err) = fs::remove_dir_all(&path) {
            error!("Failed to delete {:?}: {}.", path, err);
            ok = false;
        }
    }

    Ok(ok)
}
