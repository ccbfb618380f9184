//! Crash-safe persistence of last-execution timestamps.
//!
//! The store is a single JSON object, `job_id -> unix seconds`, written to a
//! sibling `.tmp` file and atomically renamed into place. This replaces the
//! dbm-backed store of the reference implementation: a dbm file can be left
//! in an inconsistent state if the process dies mid-write, whereas rename(2)
//! within the same directory is atomic on the filesystems this daemon
//! targets.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors reading or writing the on-disk schedule store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("reading schedule store {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("writing schedule store {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("schedule store {path} is not valid JSON: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The on-disk map of job id to last-execution unix timestamp.
#[derive(Debug, Default)]
pub struct Store {
    path: PathBuf,
    entries: HashMap<String, i64>,
}

impl Store {
    /// Opens (or lazily creates) the store backed by `path`. A missing file
    /// is treated as an empty store, matching `dbm.open(path, 'c')`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Store, StoreError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                path: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Store { path, entries })
    }

    pub fn get(&self, job_id: &str) -> Option<i64> {
        self.entries.get(job_id).copied()
    }

    /// Sets `job_id`'s timestamp and persists the whole store.
    pub fn set(&mut self, job_id: &str, value: i64) -> Result<(), StoreError> {
        self.entries.insert(job_id.to_string(), value);
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let tmp_path = tmp_path_for(&self.path);
        let body = serde_json::to_vec_pretty(&self.entries).expect("HashMap<String, i64> always serializes");
        fs::write(&tmp_path, body).map_err(|source| StoreError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
