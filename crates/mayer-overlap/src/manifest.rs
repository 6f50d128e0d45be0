use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;
use mayer_core::errors::ErrorInfo;
use mayer_core::MayerError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::calibrator::CalibrationSource;
use crate::config::OverlapConfig;
use crate::estimator::RatioEstimate;

/// Structured manifest describing a completed overlap-sampling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: OverlapConfig,
    /// SHA-256 of the canonical JSON form of `config`.
    pub config_hash: String,
    /// Master seed used to derive the substreams.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Calibrated bias used for production.
    pub ref_pref: f64,
    /// Origin of the calibrated bias.
    pub calibration_source: CalibrationSource,
    /// Final estimate.
    pub estimate: RatioEstimate,
    /// Acceptance rates keyed by `role/move`.
    pub acceptance_rates: IndexMap<String, f64>,
    /// Progress CSV relative to the run directory.
    pub progress_file: Option<PathBuf>,
    /// Calibration file consulted and written by the run.
    pub calibration_file: Option<PathBuf>,
}

impl RunManifest {
    /// Timestamp in the format stored in `created_at`.
    pub fn timestamp() -> String {
        Utc::now().to_rfc3339()
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), MayerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                MayerError::Persistence(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            MayerError::Persistence(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            MayerError::Persistence(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, MayerError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            MayerError::Persistence(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            MayerError::Persistence(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Stable hex digest of a configuration.
pub fn config_hash(config: &OverlapConfig) -> Result<String, MayerError> {
    let bytes = serde_json::to_vec(config).map_err(|err| {
        MayerError::Config(ErrorInfo::new("config-serialize", err.to_string()))
    })?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}
