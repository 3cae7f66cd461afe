use crate::models::RawRecord;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// I/O failure other than "file not found"; the caller keeps its previous snapshot
#[derive(Debug, Error)]
#[error("Failed to read data file {path}: {source}")]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The data file exists but is not a JSON array of objects
#[derive(Debug, Error)]
#[error("Invalid JSON in data file {path}: {source}")]
pub struct MalformedDataError {
    pub path: PathBuf,
    #[source]
    pub source: serde_json::Error,
}

/// Immutable capture of every raw record in the data file at one point in time
#[derive(Debug)]
pub struct Snapshot {
    records: Vec<RawRecord>,
    loaded_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Snapshot {
            records,
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

pub struct LoadOutcome {
    pub snapshot: Snapshot,
    /// Set when the file was present but unparseable; the snapshot is then empty
    pub malformed: Option<MalformedDataError>,
}

pub fn load(path: &Path) -> Result<LoadOutcome, LoadError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(
                "Data file {} not found. Starting with empty dataset.",
                path.display()
            );
            return Ok(LoadOutcome {
                snapshot: Snapshot::empty(),
                malformed: None,
            });
        }
        Err(source) => {
            return Err(LoadError {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_slice::<Vec<RawRecord>>(&bytes) {
        Ok(records) => {
            info!("Loaded {} records from {}", records.len(), path.display());
            Ok(LoadOutcome {
                snapshot: Snapshot::new(records),
                malformed: None,
            })
        }
        Err(source) => {
            let err = MalformedDataError {
                path: path.to_path_buf(),
                source,
            };
            warn!("{err}");
            Ok(LoadOutcome {
                snapshot: Snapshot::empty(),
                malformed: Some(err),
            })
        }
    }
}
