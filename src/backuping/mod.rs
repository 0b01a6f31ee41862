use std::fs;
use std::time::SystemTime;

use chrono::Local;
use log::{error, info, warn};
use nix::unistd::{AccessFlags, access};

use crate::chain::{BackupRoot, naming};
use crate::config::{Config, RetentionPolicy};
use crate::core::{EmptyResult, GenericResult};
use crate::engine::{BackupEngine, BackupTask, XtraBackup};
use crate::metrics;
use crate::pruning;
use crate::scheduling::{self, BackupDecision};
use crate::util;

pub fn backup(config: &Config) -> GenericResult<bool> {
    let root = BackupRoot::new(&config.backup_root);
    let engine = XtraBackup::new(&config.engine);

    check_preconditions(&root, &engine)?;
    let _lock = util::sys::acquire_lock(root.path())?;
    root.prepare()?;

    let mut ok = run(&root, &engine, &config.retention)?;

    if let Some(metrics_path) = config.prometheus_metrics.as_ref() {
        if let Err(err) = save_metrics(&root, metrics_path) {
            error!("Failed to save metrics: {}.", err);
            ok = false;
        }
    }

    Ok(ok)
}

// All precondition failures are fatal and happen before anything is mutated on disk
fn check_preconditions(root: &BackupRoot, engine: &dyn BackupEngine) -> EmptyResult {
    root.check()?;

    access(root.path(), AccessFlags::W_OK | AccessFlags::X_OK).map_err(|_| format!(
        "{:?} backup root is not writable", root.path()))?;

    engine.check().map_err(|e| format!("{} engine check failed: {}", engine.name(), e))?;

    Ok(())
}

pub fn run(root: &BackupRoot, engine: &dyn BackupEngine, policy: &RetentionPolicy) -> GenericResult<bool> {
    let now = SystemTime::now();

    let (latest_full, mut ok) = root.locate_latest_full()?;
    let latest_incremental = match latest_full.as_ref() {
        Some(full) => {
            let (latest_incremental, incremental_ok) = root.locate_latest_incremental(full)?;
            ok &= incremental_ok;
            latest_incremental
        },
        None => None,
    };

    let decision = scheduling::decide(latest_full.as_ref(), latest_incremental.as_ref(), now, policy);

    let (parent_path, base_path) = match decision {
        BackupDecision::Full => (root.full_namespace_path(), None),
        BackupDecision::Incremental {full, base} => (root.incremental_dir(&full.name), Some(base)),
    };

    let name = naming::new_set_name(Local::now());
    let final_path = parent_path.join(&name);
    let temp_path = parent_path.join(naming::temporary_set_name(&name));

    fs::create_dir_all(&parent_path).map_err(|e| format!(
        "Unable to create {:?}: {}", parent_path, e))?;

    if final_path.exists() {
        return Err!("Unable to create {:?} backup: it already exists", name);
    }

    fs::create_dir(&temp_path).map_err(|e| format!(
        "Unable to create {:?}: {}", temp_path, e))?;

    let task = match base_path {
        Some(base_path) => BackupTask::Incremental {target_path: &temp_path, base_path},
        None => BackupTask::Full {target_path: &temp_path},
    };
    let backup_type = task.type_();

    info!("Creating {:?} {} backup...", name, backup_type);
    if let Some(base_path) = base_path {
        info!("Using {:?} as the incremental base.", base_path);
    }

    let result = engine.invoke(&task)?;

    if !result.success {
        error!("The backup engine hasn't reported success. Its output:\n{}",
               result.output.trim_end());
        // The temporary directory is left as is: the locator never selects its name, and its
        // contents may help in diagnosing the failure
        return Err!("Failed to create {:?} {} backup", name, backup_type);
    }

    match result.artifact_path.as_ref() {
        None => warn!(concat!(
            "The backup engine has reported success, but the created backup path can't be ",
            "extracted from its output.")),
        Some(path) if *path != temp_path => warn!(
            "The backup engine has reported an unexpected created backup path: {:?}.", path),
        Some(_) => (),
    }

    fs::rename(&temp_path, &final_path).map_err(|e| format!(
        "Unable to rename {:?} to {:?}: {}", temp_path, final_path, e))?;

    if let Err(err) = util::sys::fsync_directory(&parent_path) {
        error!("Failed to fsync {:?}: {}.", parent_path, err);
        ok = false;
    }

    info!("{:?} {} backup has been successfully created.", name, backup_type);

    // Pruning runs after every successful backup, so a long run of incrementals still ages old
    // generations out on schedule
    let (_deleted, prune_ok) = pruning::prune(root, policy, now)?;
    ok &= prune_ok;

    Ok(ok)
}

fn save_metrics(root: &BackupRoot, path: &str) -> EmptyResult {
    let (chains, _ok) = root.list_chains()?;
    metrics::collect(&chains)?;
    metrics::save(path)
}
