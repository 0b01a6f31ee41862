use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime};

use assert_fs::TempDir;
use filetime::FileTime;
use log::info;

use crate::backuping;
use crate::chain::BackupRoot;
use crate::config::{Config, EngineConfig, RetentionPolicy};
use crate::core::EmptyResult;

const FULL_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[test]
fn backup_chain_lifecycle() -> EmptyResult {
    let _ = easy_logging::init(module_path!().split("::").next().unwrap(), log::Level::Info);

    let temp_dir = TempDir::new()?;

    let backup_root_path = temp_dir.path().join("backups");
    fs::create_dir(&backup_root_path)?;

    let engine_path = temp_dir.path().join("engine.sh");
    let failing_engine_path = temp_dir.path().join("failing-engine.sh");
    write_engine_script(&engine_path, true)?;
    write_engine_script(&failing_engine_path, false)?;

    let metrics_path = temp_dir.path().join("backup.prom");
    let config = new_config(&backup_root_path, &engine_path, Some(&metrics_path));
    let root = BackupRoot::new(&backup_root_path);

    // An empty root always produces a full backup
    info!("#0 pass: initial full backup...");
    assert!(backuping::backup(&config)?);

    let (full, ok) = root.locate_latest_full()?;
    assert!(ok);
    let full = full.unwrap();

    let args = read_engine_args(&full.path);
    assert!(args.contains("--backup"));
    assert!(args.contains("--parallel=2"));
    assert!(!args.contains("--incremental-basedir"));

    // Subsequent backups within the full set lifetime extend the chain with incrementals, each
    // based on its predecessor
    for pass in 1..3 {
        info!("#{} pass: incremental backup...", pass);
        thread::sleep(Duration::from_millis(10));
        assert!(backuping::backup(&config)?);

        let (chains, ok) = root.list_chains()?;
        assert!(ok);
        assert_eq!(chains.len(), 1);

        let chain = chains.last().unwrap();
        assert_eq!(chain.full.name, full.name);
        assert_eq!(chain.incrementals.len(), pass);

        // Each incremental's base must resolve to an existing set: the owning full set for the
        // first one, the previous incremental for the others
        for (index, incremental) in chain.incrementals.iter().enumerate() {
            let base_path = match index {
                0 => chain.full.path.as_path(),
                _ => chain.incrementals[index - 1].path.as_path(),
            };
            assert!(base_path.is_dir());
            assert_eq!(incremental.full_name, chain.full.name);

            let args = read_engine_args(&incremental.path);
            assert!(args.contains(&format!("--incremental-basedir={}", base_path.display())));

            if index > 0 {
                assert!(chain.incrementals[index - 1].name < incremental.name);
            }
        }
    }

    let (chains, _ok) = root.list_chains()?;
    let names_before_failure: Vec<String> = chain_names(&chains);

    // An engine failure is fatal and must not leave anything selectable as a future base
    info!("#3 pass: engine failure...");
    thread::sleep(Duration::from_millis(10));
    let failing_config = new_config(&backup_root_path, &failing_engine_path, None);
    assert!(backuping::backup(&failing_config).is_err());

    let (chains, ok) = root.list_chains()?;
    assert!(ok);
    assert_eq!(chain_names(&chains), names_before_failure);

    // The aged out full set forces a new chain, and the expired one is pruned in the same run
    info!("#4 pass: chain rotation...");
    backdate(&full.path, SystemTime::now() - 2 * FULL_LIFETIME);
    thread::sleep(Duration::from_millis(10));
    assert!(backuping::backup(&config)?);

    let (chains, ok) = root.list_chains()?;
    assert!(ok);
    assert_eq!(chains.len(), 1);

    let chain = chains.last().unwrap();
    assert_ne!(chain.full.name, full.name);
    assert!(chain.incrementals.is_empty());
    assert!(!root.incremental_dir(&full.name).exists());

    let metrics = fs::read_to_string(&metrics_path)?;
    assert!(metrics.contains("backup_full_backups 1"));

    Ok(())
}

fn new_config(backup_root: &Path, engine_path: &Path, metrics_path: Option<&Path>) -> Config {
    Config {
        backup_root: backup_root.to_str().unwrap().to_owned(),
        retention: RetentionPolicy {
            full_lifetime: FULL_LIFETIME,
            keep_full_count: 1,
        },
        engine: EngineConfig {
            binary: engine_path.to_str().unwrap().to_owned(),
            defaults_file: None,
            options: vec![s!("--parallel=2")],
            ping_command: None,
        },
        prometheus_metrics: metrics_path.map(|path| path.to_str().unwrap().to_owned()),
    }
}

fn write_engine_script(path: &Path, success: bool) -> EmptyResult {
    let mut script = String::from(concat!(
        "#!/bin/sh\n",
        "if [ \"$1\" = \"--version\" ]; then\n",
        "    echo \"xtrabackup version 8.0.35-31 based on MySQL server 8.0.35\"\n",
        "    exit 0\n",
        "fi\n",
        "target=\"\"\n",
        "for arg in \"$@\"; do\n",
        "    case \"$arg\" in\n",
        "        --target-dir=*) target=\"${arg#--target-dir=}\" ;;\n",
        "    esac\n",
        "done\n",
        "mkdir -p \"$target\"\n",
        "printf '%s\\n' \"$*\" > \"$target/engine.args\"\n",
    ));

    if success {
        script.push_str(concat!(
            "echo \"250101 00:00:00 Backup created in directory '$target'\" >&2\n",
            "echo \"250101 00:00:00 completed OK!\" >&2\n",
        ));
    } else {
        script.push_str("echo \"250101 00:00:00 Error: query failed: connection reset\" >&2\n");
    }

    fs::write(path, script)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;

    Ok(())
}

fn read_engine_args(backup_path: &Path) -> String {
    fs::read_to_string(backup_path.join("engine.args")).unwrap()
}

fn chain_names(chains: &[crate::chain::Chain]) -> Vec<String> {
    chains.iter().flat_map(|chain| {
        std::iter::once(chain.full.name.clone())
            .chain(chain.incrementals.iter().map(|incremental| incremental.name.clone()))
    }).collect()
}

fn backdate(path: &Path, time: SystemTime) {
    filetime::set_file_mtime(path, FileTime::from_system_time(time)).unwrap();
}
