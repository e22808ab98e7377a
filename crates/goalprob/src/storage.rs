//! Data directory and input files
//!
//! Directory structure:
//! ~/.goalprob/
//!   cache_snapshot.json  # Persisted simulation cache
//!   goalprob.log         # Written when --log-file is given
//!
//! Goals are read from a YAML input file:
//!
//! ```yaml
//! goal:
//!   id: house
//!   target_amount: 10000000
//!   current_amount: 1000000
//!   monthly_contribution: 20000
//!   timeframe: 15
//!   allocation: { equity: 0.6, debt: 0.3, gold: 0.1 }
//! profile:
//!   risk_profile: moderate
//! parameters:
//!   inflation.general: 0.055
//! analyzer:
//!   iterations: 2000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use goalprob_core::config::AnalyzerConfig;
use goalprob_core::model::{Goal, Profile};
use goalprob_core::parameters::StaticParameters;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SNAPSHOT_FILE_NAME: &str = "cache_snapshot.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// One analysis request as written by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFile {
    pub goal: Goal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    /// Flat parameter path to value, served to the analyzer as its
    /// parameter service
    #[serde(default, skip_serializing_if = "StaticParameters::is_empty")]
    pub parameters: StaticParameters,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl InputFile {
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let content = fs::read_to_string(path).map_err(|e| {
            StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| StorageError::Parse(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(yaml: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(yaml)
    }
}

/// Manages the data directory holding the cache snapshot and logs
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the default data directory path (~/.goalprob/)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".goalprob")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE_NAME)
    }

    pub fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| StorageError::Io(format!("Failed to create data directory: {}", e)))
    }

    /// Delete the snapshot. Returns whether one existed.
    pub fn remove_snapshot(&self) -> Result<bool, StorageError> {
        match fs::remove_file(self.snapshot_path()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(format!("Failed to remove snapshot: {}", e))),
        }
    }
}

impl Default for DataDirectory {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}
