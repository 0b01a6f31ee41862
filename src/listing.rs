use chrono::{DateTime, Local};

use crate::chain::BackupRoot;
use crate::config::Config;
use crate::core::GenericResult;

pub fn list(config: &Config) -> GenericResult<bool> {
    let root = BackupRoot::new(&config.backup_root);
    let (chains, ok) = root.list_chains()?;

    if chains.is_empty() {
        println!("There are no backups yet.");
        return Ok(ok);
    }

    for chain in &chains {
        println!("{} (created {})", chain.full.name, format_time(chain.full.created));

        for (index, incremental) in chain.incrementals.iter().enumerate() {
            let base_name = match index {
                0 => incremental.full_name.as_str(),
                _ => chain.incrementals[index - 1].name.as_str(),
            };
            println!("  {} (base {})", incremental.name, base_name);
        }
    }

    Ok(ok)
}

fn format_time(time: std::time::SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y.%m.%d %H:%M:%S").to_string()
}
