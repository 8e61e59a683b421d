//! High score persistence
//!
//! The session only talks to [`HighScoreStore`]. `JsonFileStore` keeps the
//! value in a small JSON object on disk, next to any other keys the file
//! already holds.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Key the high score is stored under
pub const HIGH_SCORE_KEY: &str = "snakeHighScore";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed score file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("score store unavailable")]
    Unavailable,
}

pub trait HighScoreStore {
    fn get(&self) -> Result<u32, StoreError>;
    fn set(&mut self, value: u32) -> Result<(), StoreError>;
}

/// JSON file holding `{ "snakeHighScore": <n> }`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, serde_json::Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })
    }
}

impl HighScoreStore for JsonFileStore {
    fn get(&self) -> Result<u32, StoreError> {
        let entries = self.read_entries()?;
        Ok(entries
            .get(HIGH_SCORE_KEY)
            .and_then(|value| value.as_u64())
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0))
    }

    fn set(&mut self, value: u32) -> Result<(), StoreError> {
        // A corrupt file is replaced rather than blocking the write
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StoreError::Format { .. }) => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        entries.insert(HIGH_SCORE_KEY.to_string(), value.into());

        let json = serde_json::to_string_pretty(&entries).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-process store, optionally failing every call
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: u32,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new(value: u32) -> Self {
        Self {
            value,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            value: 0,
            unavailable: true,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}

impl HighScoreStore for MemoryStore {
    fn get(&self) -> Result<u32, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        Ok(self.value)
    }

    fn set(&mut self, value: u32) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.value = value;
        Ok(())
    }
}
