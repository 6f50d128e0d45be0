//! Structured error types shared across the Mayer crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MayerError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (phase, step counts, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the overlap-sampling engine.
///
/// Every variant is fatal for the run that produced it; rejected Monte Carlo
/// moves and missing calibration files are ordinary control flow and never
/// surface here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MayerError {
    /// Invalid run configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// No nonzero-weight starting configuration could be found.
    #[error("initialization error: {0}")]
    Initialization(ErrorInfo),
    /// The reference preference search produced an unusable value.
    #[error("calibration error: {0}")]
    Calibration(ErrorInfo),
    /// Calibration file or artefact I/O failures.
    #[error("persistence error: {0}")]
    Persistence(ErrorInfo),
    /// Non-finite averages or otherwise degenerate statistics.
    #[error("statistics error: {0}")]
    Statistics(ErrorInfo),
    /// Move proposer failures.
    #[error("move error: {0}")]
    Move(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MayerError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MayerError::Config(info)
            | MayerError::Initialization(info)
            | MayerError::Calibration(info)
            | MayerError::Persistence(info)
            | MayerError::Statistics(info)
            | MayerError::Move(info) => info,
        }
    }
}
