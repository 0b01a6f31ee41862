use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::time::UNIX_EPOCH;

use lazy_static::lazy_static;
use prometheus::{self, Encoder, Gauge, TextEncoder};

use crate::chain::Chain;
use crate::core::{EmptyResult, GenericError};

lazy_static! {
    static ref FULL_BACKUPS: Gauge = register(
        "full_backups", "Number of full backup sets in the backup root.");
    static ref CHAIN_LENGTH: Gauge = register(
        "chain_length", "Number of incremental backups in the current chain.");
    static ref LAST_BACKUP_TIME: Gauge = register(
        "last_backup_time", "Creation time of the most recent backup set.");
}

pub fn collect(chains: &[Chain]) -> EmptyResult {
    FULL_BACKUPS.set(chains.len() as f64);

    let chain = match chains.last() {
        Some(chain) => chain,
        None => return Ok(()),
    };

    CHAIN_LENGTH.set(chain.incrementals.len() as f64);

    let last_created = chain.incrementals.last()
        .map(|incremental| incremental.created)
        .unwrap_or(chain.full.created);

    let last_created = last_created.duration_since(UNIX_EPOCH).map_err(|_| format!(
        "Got an invalid {:?} backup creation time", chain.full.name))?;
    LAST_BACKUP_TIME.set(last_created.as_secs() as f64);

    Ok(())
}

pub fn save(path: &str) -> EmptyResult {
    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();

    let temp_path = format!("{}.tmp", path);
    let mut file = BufWriter::new(File::create(&temp_path)?);

    encoder.encode(&metrics, &mut file)
        .map_err(Into::into)
        .and_then(|_| {
            Ok(file.flush()?)
        })
        .or_else(|err: GenericError| {
            fs::remove_file(&temp_path)?;
            Err(err)
        })?;

    Ok(fs::rename(&temp_path, path)?)
}

fn register(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(format!("backup_{}", name), help).unwrap();
    prometheus::register(Box::new(gauge.clone())).unwrap();
    gauge
}
