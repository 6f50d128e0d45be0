#![deny(missing_docs)]

//! Overlap-sampling engine for Mayer-sampling cluster integrals.
//!
//! Two Metropolis ensembles, one sampling a reference integrand with a known
//! integral and one sampling the target integrand, are interleaved by an
//! [`OverlapCoordinator`]. A [`Calibrator`] searches for the Bennett bias at
//! which both ensembles agree, after which production samples feed the
//! [`estimator`] that reports `Z_target / Z_reference` with its error.

/// Block-averaged accumulators and bias grids.
pub mod accumulator;
/// Wide/narrow/final bias search.
pub mod calibrator;
/// YAML configuration schema and defaults.
pub mod config;
/// Interleaving of the two samplers.
pub mod coordinator;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Ratio and error estimation.
pub mod estimator;
/// Core run entry point.
pub mod kernel;
/// Run manifest serialization helpers.
pub mod manifest;
/// Move sets and step-size tracking.
pub mod moves;
/// Progress reporting.
pub mod progress;
/// Metropolis sampler for one ensemble.
pub mod sampler;
/// Session state shared across components.
pub mod session;
/// Calibration file persistence.
pub mod store;
pub mod toy;

pub use accumulator::{BiasGrid, OverlapAccumulator, OverlapData, SlotStatistics};
pub use calibrator::{CalibrationOutcome, CalibrationSource, Calibrator};
pub use config::{
    CalibrationConfig, InitConfig, OutputConfig, OverlapConfig, ProductionConfig,
    SamplingConfig, SeedPolicy,
};
pub use coordinator::{OverlapCoordinator, SamplingMode};
pub use estimator::{EnsembleDiagnostics, RatioEstimate};
pub use kernel::{run, RunSummary};
pub use moves::{MoveSet, StepTracker, Translation};
pub use progress::{ProgressRecord, ProgressRecorder, ProgressSink};
pub use sampler::{Ensemble, EnsembleSampler};
pub use session::{CalibrationPhase, OverlapSession, RefPref};
pub use store::CalibrationStore;
