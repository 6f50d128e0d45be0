use std::fs;
use std::path::{Path, PathBuf};

use mayer_core::errors::ErrorInfo;
use mayer_core::MayerError;
use tracing::{debug, warn};

/// Plain-text file holding the calibrated bias as a single float.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the calibration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads a previously calibrated bias.
    ///
    /// A missing file, an unreadable file and a value that is not a finite
    /// positive float all yield `None`; the caller then calibrates from
    /// scratch.
    pub fn load(&self) -> Option<f64> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "no calibration file");
                return None;
            }
        };
        let token = contents.split_whitespace().next().unwrap_or_default();
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Some(value),
            Ok(value) => {
                warn!(path = %self.path.display(), value, "ignoring unusable calibration value");
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring malformed calibration file");
                None
            }
        }
    }

    /// Writes `value` followed by a newline, replacing the file.
    pub fn store(&self, value: f64) -> Result<(), MayerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                MayerError::Persistence(
                    ErrorInfo::new("calibration-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        fs::write(&self.path, format!("{value:e}\n")).map_err(|err| {
            MayerError::Persistence(
                ErrorInfo::new("calibration-write", err.to_string())
                    .with_context("path", self.path.display().to_string())
                    .with_hint("the calibrated bias could not be saved"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stored_value_round_trips_exactly() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("nested/refpref.txt"));
        let value = 2.000_123_456_789_012_3;
        store.store(value).unwrap();
        assert_eq!(store.load(), Some(value));
    }

    #[test]
    fn missing_and_malformed_files_are_absent() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("refpref.txt"));
        assert_eq!(store.load(), None);
        fs::write(store.path(), "not a number\n").unwrap();
        assert_eq!(store.load(), None);
        fs::write(store.path(), "-3.0\n").unwrap();
        assert_eq!(store.load(), None);
        fs::write(store.path(), "NaN\n").unwrap();
        assert_eq!(store.load(), None);
        fs::write(store.path(), "  1.5  \n").unwrap();
        assert_eq!(store.load(), Some(1.5));
    }

    #[test]
    fn write_into_a_directory_fails() {
        let dir = tempdir().unwrap();
        let store = CalibrationStore::new(dir.path());
        let err = store.store(1.0).unwrap_err();
        assert!(matches!(err, MayerError::Persistence(_)));
        assert_eq!(err.info().code, "calibration-write");
    }
}
