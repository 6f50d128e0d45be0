use std::fs;
use std::path::{Path, PathBuf};

use mayer_core::errors::ErrorInfo;
use mayer_core::MayerError;
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing an overlap-sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapConfig {
    /// Coordinator behaviour shared by every phase.
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Reference preference search settings.
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Production sampling budget.
    #[serde(default)]
    pub production: ProductionConfig,
    /// Starting-configuration search.
    #[serde(default)]
    pub init: InitConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            calibration: CalibrationConfig::default(),
            production: ProductionConfig::default(),
            init: InitConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

fn config_error(code: &str, message: &str) -> MayerError {
    MayerError::Config(ErrorInfo::new(code, message))
}

impl OverlapConfig {
    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, MayerError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            MayerError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|err| {
            MayerError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the coordinator and calibrator rely on.
    pub fn validate(&self) -> Result<(), MayerError> {
        let sampling = &self.sampling;
        if sampling.sub_steps == 0 {
            return Err(config_error("sub-steps", "sampling.sub_steps must be positive"));
        }
        if !(sampling.min_step_fraction > 0.0 && sampling.min_step_fraction < 0.5) {
            return Err(config_error(
                "min-step-fraction",
                "sampling.min_step_fraction must lie in (0, 0.5)",
            ));
        }
        if !(sampling.ref_step_fraction > 0.0 && sampling.ref_step_fraction < 1.0) {
            return Err(config_error(
                "ref-step-fraction",
                "sampling.ref_step_fraction must lie in (0, 1)",
            ));
        }
        let calibration = &self.calibration;
        if !(calibration.initial_ref_pref.is_finite() && calibration.initial_ref_pref > 0.0) {
            return Err(config_error(
                "initial-ref-pref",
                "calibration.initial_ref_pref must be finite and positive",
            ));
        }
        if calibration.wide_points < 2 || calibration.narrow_points < 2 {
            return Err(config_error(
                "grid-points",
                "calibration grids need at least two points",
            ));
        }
        if !(calibration.wide_span > 1.0 && calibration.narrow_span > 1.0) {
            return Err(config_error(
                "grid-span",
                "calibration spans must exceed 1",
            ));
        }
        if calibration.max_narrow_iterations == 0 {
            return Err(config_error(
                "narrow-iterations",
                "calibration.max_narrow_iterations must be positive",
            ));
        }
        if calibration.block_size == 0 {
            return Err(config_error(
                "block-size",
                "calibration.block_size must be positive",
            ));
        }
        if self.production.block_size == Some(0) || self.production.target_blocks == 0 {
            return Err(config_error(
                "block-size",
                "production block size and target block count must be positive",
            ));
        }
        let min_budget = 2 * sampling.sub_steps;
        for (name, steps) in [
            ("calibration.search_steps", calibration.search_steps),
            ("calibration.narrow_steps", calibration.narrow_steps),
            ("production.steps", self.production.steps),
        ] {
            if steps < min_budget {
                return Err(MayerError::Config(
                    ErrorInfo::new(
                        "phase-budget",
                        format!("{name} must cover a macro-step for each ensemble"),
                    )
                    .with_context("steps", steps.to_string())
                    .with_context("minimum", min_budget.to_string()),
                ));
            }
        }
        if self.init.max_attempts == 0 {
            return Err(config_error(
                "init-attempts",
                "init.max_attempts must be positive",
            ));
        }
        Ok(())
    }
}

/// Coordinator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Sampler steps executed per macro-step on the selected ensemble.
    #[serde(default = "default_sub_steps")]
    pub sub_steps: u64,
    /// Initial fraction of macro-steps directed to the reference ensemble.
    #[serde(default = "default_ref_step_fraction")]
    pub ref_step_fraction: f64,
    /// Keep `ref_step_fraction` fixed during production.
    #[serde(default)]
    pub pin_step_fraction: bool,
    /// Macro-steps between step-fraction re-estimates.
    #[serde(default = "default_adjust_interval")]
    pub adjust_interval: u64,
    /// Lower bound on either ensemble's share of the steps.
    #[serde(default = "default_min_step_fraction")]
    pub min_step_fraction: f64,
    /// Macro-steps between progress records (0 disables reporting).
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

fn default_sub_steps() -> u64 {
    1000
}

fn default_ref_step_fraction() -> f64 {
    0.5
}

fn default_adjust_interval() -> u64 {
    10
}

fn default_min_step_fraction() -> f64 {
    0.01
}

fn default_report_interval() -> u64 {
    100
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sub_steps: default_sub_steps(),
            ref_step_fraction: default_ref_step_fraction(),
            pin_step_fraction: false,
            adjust_interval: default_adjust_interval(),
            min_step_fraction: default_min_step_fraction(),
            report_interval: default_report_interval(),
        }
    }
}

/// Reference preference search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Centre of the wide search grid.
    #[serde(default = "default_initial_ref_pref")]
    pub initial_ref_pref: f64,
    /// Span of the wide search grid (`[c/span, c*span]`).
    #[serde(default = "default_wide_span")]
    pub wide_span: f64,
    /// Number of trial biases in the wide search.
    #[serde(default = "default_wide_points")]
    pub wide_points: usize,
    /// Span of each narrowing grid.
    #[serde(default = "default_narrow_span")]
    pub narrow_span: f64,
    /// Number of trial biases in each narrowing grid.
    #[serde(default = "default_narrow_points")]
    pub narrow_points: usize,
    /// Upper bound on narrowing passes while the minimum sits on a grid edge.
    #[serde(default = "default_max_narrow_iterations")]
    pub max_narrow_iterations: usize,
    /// Sampler steps spent in the wide search.
    #[serde(default = "default_phase_steps")]
    pub search_steps: u64,
    /// Sampler steps spent in each narrowing pass.
    #[serde(default = "default_phase_steps")]
    pub narrow_steps: u64,
    /// Block size used by the calibration accumulators.
    #[serde(default = "default_calibration_block_size")]
    pub block_size: usize,
    /// Sampler steps of move tuning once the bias is final; their data is discarded.
    #[serde(default = "default_equilibration_steps")]
    pub equilibration_steps: u64,
}

fn default_initial_ref_pref() -> f64 {
    1.0
}

fn default_wide_span() -> f64 {
    30.0
}

fn default_wide_points() -> usize {
    21
}

fn default_narrow_span() -> f64 {
    4.0
}

fn default_narrow_points() -> usize {
    11
}

fn default_max_narrow_iterations() -> usize {
    3
}

fn default_phase_steps() -> u64 {
    100_000
}

fn default_calibration_block_size() -> usize {
    100
}

fn default_equilibration_steps() -> u64 {
    10_000
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            initial_ref_pref: default_initial_ref_pref(),
            wide_span: default_wide_span(),
            wide_points: default_wide_points(),
            narrow_span: default_narrow_span(),
            narrow_points: default_narrow_points(),
            max_narrow_iterations: default_max_narrow_iterations(),
            search_steps: default_phase_steps(),
            narrow_steps: default_phase_steps(),
            block_size: default_calibration_block_size(),
            equilibration_steps: default_equilibration_steps(),
        }
    }
}

/// Production sampling budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Total sampler steps across both ensembles.
    #[serde(default = "default_production_steps")]
    pub steps: u64,
    /// Explicit block size; derived from `steps / (2 * target_blocks)` when absent.
    #[serde(default)]
    pub block_size: Option<usize>,
    /// Approximate number of blocks per ensemble when the block size is derived.
    #[serde(default = "default_target_blocks")]
    pub target_blocks: u64,
}

fn default_production_steps() -> u64 {
    1_000_000
}

fn default_target_blocks() -> u64 {
    1000
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            steps: default_production_steps(),
            block_size: None,
            target_blocks: default_target_blocks(),
        }
    }
}

impl ProductionConfig {
    /// Block size used for production accumulators.
    pub fn resolved_block_size(&self) -> usize {
        self.block_size.unwrap_or_else(|| {
            let derived = self.steps / (2 * self.target_blocks.max(1));
            derived.max(1) as usize
        })
    }
}

/// Starting-configuration search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitConfig {
    /// Trial moves attempted before a zero-weight start is declared fatal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_max_attempts() -> usize {
    1000
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Calibration file holding the reference preference; read before
    /// calibration and written after it.
    #[serde(default)]
    pub calibration_file: Option<PathBuf>,
    /// Progress CSV filename relative to `run_directory`.
    #[serde(default = "default_progress_filename")]
    pub progress_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
}

fn default_progress_filename() -> PathBuf {
    PathBuf::from("progress.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            calibration_file: None,
            progress_file: default_progress_filename(),
            manifest_file: default_manifest_filename(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "calibration:\n  wide_span: 10.0\nproduction:\n  steps: 2000\n";
        let config: OverlapConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.calibration.wide_span, 10.0);
        assert_eq!(config.calibration.wide_points, 21);
        assert_eq!(config.sampling.sub_steps, 1000);
        assert_eq!(config.production.resolved_block_size(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = OverlapConfig::default();
        config.sampling.sub_steps = 0;
        assert_eq!(config.validate().unwrap_err().info().code, "sub-steps");

        let mut config = OverlapConfig::default();
        config.calibration.narrow_span = 1.0;
        assert_eq!(config.validate().unwrap_err().info().code, "grid-span");

        let mut config = OverlapConfig::default();
        config.sampling.ref_step_fraction = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn derived_block_size_targets_block_count() {
        let production = ProductionConfig {
            steps: 1_000_000,
            block_size: None,
            target_blocks: 1000,
        };
        assert_eq!(production.resolved_block_size(), 500);
    }
}
