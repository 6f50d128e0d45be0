use std::path::PathBuf;

use indexmap::IndexMap;
use mayer_core::errors::ErrorInfo;
use mayer_core::{EnsembleRole, MayerError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibrator::{CalibrationOutcome, Calibrator};
use crate::config::{OutputConfig, OverlapConfig};
use crate::coordinator::{OverlapCoordinator, SamplingMode};
use crate::estimator::RatioEstimate;
use crate::manifest::{self, RunManifest};
use crate::progress::{ProgressRecord, ProgressRecorder};
use crate::sampler::Ensemble;
use crate::store::CalibrationStore;

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// How the production bias was obtained.
    pub calibration: CalibrationOutcome,
    /// Estimate over the production samples.
    pub estimate: RatioEstimate,
    /// Production samples across both ensembles.
    pub production_steps: u64,
    /// Sampler steps across every phase and both ensembles.
    pub total_steps: u64,
    /// Acceptance rates keyed by `role/move`.
    pub acceptance_rates: IndexMap<String, f64>,
    /// Tuned step sizes keyed by `role/move`.
    pub step_sizes: IndexMap<String, f64>,
    /// Progress records emitted during production.
    pub progress: Vec<ProgressRecord>,
    /// Progress CSV written during the run.
    pub progress_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
}

/// Calibrates, equilibrates and samples production for the two ensembles.
///
/// Artefacts are written only when `config.output.run_directory` is set; the
/// calibration file is used whenever `config.output.calibration_file` is.
pub fn run<C>(
    config: &OverlapConfig,
    reference: Ensemble<C>,
    target: Ensemble<C>,
) -> Result<RunSummary, MayerError> {
    let mut coordinator = OverlapCoordinator::new(reference, target, config)?;
    let store = calibration_path(&config.output).map(CalibrationStore::new);

    let calibration = Calibrator::new(&config.calibration, store.as_ref())
        .calibrate(&mut coordinator)?;

    if config.calibration.equilibration_steps > 0 {
        coordinator.run(
            config.calibration.equilibration_steps,
            SamplingMode::Equilibration,
            None,
        )?;
    }
    let block_size = config.production.resolved_block_size();
    coordinator.reset_statistics(block_size);
    info!(
        ref_pref = calibration.ref_pref,
        steps = config.production.steps,
        block_size,
        "starting production"
    );

    let mut recorder = ProgressRecorder::new();
    coordinator.run(
        config.production.steps,
        SamplingMode::Production,
        Some(&mut recorder),
    )?;
    let estimate = coordinator.estimate()?;
    info!(
        ratio = estimate.ratio,
        error = estimate.error,
        integral_ratio = estimate.integral_ratio,
        "production finished"
    );

    let mut acceptance_rates = IndexMap::new();
    let mut step_sizes = IndexMap::new();
    for role in EnsembleRole::ALL {
        let moves = coordinator.sampler(role).moves();
        for (name, rate) in moves.acceptance_rates() {
            acceptance_rates.insert(format!("{}/{}", role.as_str(), name), rate);
        }
        for (name, step) in moves.step_sizes() {
            step_sizes.insert(format!("{}/{}", role.as_str(), name), step);
        }
    }

    let mut progress_path = None;
    let mut manifest_path = None;
    if let Some(run_dir) = &config.output.run_directory {
        std::fs::create_dir_all(run_dir).map_err(|err| {
            MayerError::Persistence(
                ErrorInfo::new("run-dir-create", err.to_string())
                    .with_context("path", run_dir.display().to_string()),
            )
        })?;
        let path = run_dir.join(&config.output.progress_file);
        recorder.write_csv(&path).map_err(|err| {
            MayerError::Persistence(
                ErrorInfo::new("progress-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        progress_path = Some(path);

        let path = run_dir.join(&config.output.manifest_file);
        let manifest = RunManifest {
            config: config.clone(),
            config_hash: manifest::config_hash(config)?,
            master_seed: config.seed_policy.master_seed,
            seed_label: config.seed_policy.label.clone(),
            created_at: RunManifest::timestamp(),
            ref_pref: calibration.ref_pref,
            calibration_source: calibration.source,
            estimate,
            acceptance_rates: acceptance_rates.clone(),
            progress_file: Some(config.output.progress_file.clone()),
            calibration_file: store.as_ref().map(|store| store.path().to_path_buf()),
        };
        manifest.write(&path)?;
        manifest_path = Some(path);
    }

    Ok(RunSummary {
        calibration,
        estimate,
        production_steps: coordinator.production_steps(),
        total_steps: EnsembleRole::ALL
            .iter()
            .map(|&role| coordinator.session().total_steps(role))
            .sum(),
        acceptance_rates,
        step_sizes,
        progress: recorder.records().to_vec(),
        progress_path,
        manifest_path,
    })
}

/// Calibration file location; relative paths live under the run directory
/// when one is configured.
pub fn calibration_path(output: &OutputConfig) -> Option<PathBuf> {
    let file = output.calibration_file.as_ref()?;
    match &output.run_directory {
        Some(run_dir) if file.is_relative() => Some(run_dir.join(file)),
        _ => Some(file.clone()),
    }
}
