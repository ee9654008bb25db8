//! Output module for run statistics and status files
//!
//! This module handles:
//! - The statistics record a pipeline run produces
//! - Writing JSON files atomically so readers never see half a record
//! - Console rendering for the CLI

pub mod stats;

pub use stats::{print_statistics, print_status_records, StatsRecord};

use crate::HarvestError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes a value as pretty JSON, replacing the target atomically
///
/// The JSON goes to a sibling temp file which is synced and then renamed
/// over `path`.
///
/// # Arguments
///
/// * `path` - Final location of the file
/// * `value` - Value to serialize
///
/// # Returns
///
/// * `Ok(())` - File written and renamed into place
/// * `Err(io::Error)` - Serialization or IO failure; `path` is untouched
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp_path = temp_path_for(path);

    let written = (|| -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    Ok(())
}

/// Reads a JSON file written by [`write_json_atomic`]
///
/// Returns `Ok(None)` when the file does not exist. Malformed JSON surfaces
/// as an `InvalidData` error.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Writes the stats file for a finished run
pub fn write_stats_file(path: &Path, stats: &StatsRecord) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_json_atomic(path, stats)?;
    tracing::debug!("Wrote stats file {}", path.display());
    Ok(())
}

/// Reads a stats file, returning None if it is missing
pub fn read_stats_file(path: &Path) -> Result<Option<StatsRecord>, HarvestError> {
    Ok(read_json(path)?)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
