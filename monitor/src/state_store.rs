// File: monitor/src/state_store.rs
//! Durable per-validator state
//!
//! One JSON file per validator under the state directory. Writes go to a
//! temporary file first and are renamed into place so a crash never leaves a
//! half-written snapshot behind.

use crate::errors::PersistenceError;
use crate::health::ValidatorState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

const STATE_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    validator: String,
    saved_at: DateTime<Utc>,
    state: ValidatorState,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, validator: &str) -> PathBuf {
        self.dir.join(format!("state_{}.json", safe_file_name(validator)))
    }

    pub async fn save(&self, validator: &str, state: &ValidatorState) -> Result<(), PersistenceError> {
        let path = self.path_for(validator);
        let write_failed = |reason: String| PersistenceError::WriteFailed {
            path: path.display().to_string(),
            reason,
        };

        let file = StateFile {
            version: STATE_FILE_VERSION,
            validator: validator.to_string(),
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| write_failed(e.to_string()))?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .await
            .map_err(|e| write_failed(e.to_string()))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        debug!("State for {} saved to {:?}", validator, path);
        Ok(())
    }

    /// `Ok(None)` when no state file exists yet
    pub async fn load(&self, validator: &str) -> Result<Option<ValidatorState>, PersistenceError> {
        let path = self.path_for(validator);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PersistenceError::ReadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let file: StateFile = serde_json::from_str(&json).map_err(|e| PersistenceError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if file.validator != validator {
            warn!(
                "State file {:?} was written for '{}', loading it for '{}'",
                path, file.validator, validator
            );
        }
        Ok(Some(file.state))
    }

    /// Restore a validator's state, starting fresh when the file is missing or unreadable
    pub async fn restore(&self, validator: &str) -> Option<ValidatorState> {
        match self.load(validator).await {
            Ok(Some(state)) => {
                info!(
                    "Restored state for {}: {} ({} consecutive failures)",
                    validator, state.verdict, state.consecutive_failures
                );
                Some(state)
            }
            Ok(None) => {
                info!("No saved state for {}, starting fresh", validator);
                None
            }
            Err(e) => {
                error!("CRITICAL: {} - starting {} fresh", e, validator);
                None
            }
        }
    }
}

fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
