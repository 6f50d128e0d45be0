use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use mayer_core::Integrand;
use mayer_overlap::toy::{BoxedLinear, CosineModulated, GaussianCluster, ScaledIntegrand};
use mayer_overlap::{Ensemble, MoveSet, OverlapConfig, RunSummary, Translation};
use serde::Serialize;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML configuration describing the run.
    #[arg(long)]
    pub config: PathBuf,
    /// Output directory for run artefacts; overrides `output.run_directory`.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Synthetic system to sample.
    #[arg(long, value_enum, default_value_t = Scenario::Gaussian)]
    pub scenario: Scenario,
    /// Length of the coordinate vector.
    #[arg(long, default_value_t = 1)]
    pub dimensions: usize,
    /// Width ratio (gaussian), scale factor (proportional, boxed-linear) or
    /// wavenumber (cosine).
    #[arg(long, default_value_t = 2.0)]
    pub factor: f64,
    /// Overrides `seed_policy.master_seed`.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Gaussians of width 1 and `factor`.
    Gaussian,
    /// Unit-box lines `0.9 + 0.2u` and `factor` times that.
    BoxedLinear,
    /// A Gaussian and `factor` times the same Gaussian.
    Proportional,
    /// A Gaussian and the same Gaussian modulated by `cos(factor·x)`.
    Cosine,
}

/// Ensembles plus the ratios the run should reproduce.
pub struct ScenarioSetup {
    pub reference: Ensemble<Vec<f64>>,
    pub target: Ensemble<Vec<f64>>,
    pub expected_ratio: Option<f64>,
    pub expected_integral_ratio: f64,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    scenario: Scenario,
    dimensions: usize,
    factor: f64,
    expected_ratio: Option<f64>,
    expected_integral_ratio: f64,
    summary: &'a RunSummary,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = OverlapConfig::load(&args.config)?;
    if let Some(out) = &args.out {
        config.output.run_directory = Some(out.clone());
        if config.output.calibration_file.is_none() {
            config.output.calibration_file = Some(PathBuf::from("refpref.txt"));
        }
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }

    let setup = build_scenario(args.scenario, args.dimensions, args.factor)?;
    info!(
        scenario = ?args.scenario,
        dimensions = args.dimensions,
        factor = args.factor,
        "starting run"
    );
    let summary = mayer_overlap::run(&config, setup.reference, setup.target)?;

    let report = RunReport {
        scenario: args.scenario,
        dimensions: args.dimensions,
        factor: args.factor,
        expected_ratio: setup.expected_ratio,
        expected_integral_ratio: setup.expected_integral_ratio,
        summary: &summary,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn build_scenario(
    scenario: Scenario,
    dimensions: usize,
    factor: f64,
) -> Result<ScenarioSetup, Box<dyn Error>> {
    if dimensions == 0 {
        return Err("dimensions must be positive".into());
    }
    if !(factor.is_finite() && factor > 0.0) {
        return Err("factor must be finite and positive".into());
    }
    let origin = vec![0.0; dimensions];
    let setup = match scenario {
        Scenario::Gaussian => {
            let expected = factor.powi(dimensions as i32);
            pair(
                origin,
                Arc::new(GaussianCluster::new(1.0)),
                Arc::new(GaussianCluster::new(factor)),
                (1.0, factor),
                Some(expected),
                expected,
            )
        }
        Scenario::BoxedLinear => pair(
            vec![0.5],
            Arc::new(BoxedLinear::new(0.9, 0.2)),
            Arc::new(BoxedLinear::new(0.9 * factor, 0.2 * factor)),
            (0.5, 0.5),
            Some(factor),
            factor,
        ),
        Scenario::Proportional => {
            let base: Arc<dyn Integrand<Vec<f64>>> = Arc::new(GaussianCluster::new(1.0));
            pair(
                origin,
                base.clone(),
                Arc::new(ScaledIntegrand::new(base, factor)),
                (1.0, 1.0),
                Some(factor),
                factor,
            )
        }
        Scenario::Cosine => {
            let wave = CosineModulated::new(1.0, factor);
            let expected = wave.damping(dimensions);
            pair(
                origin,
                Arc::new(GaussianCluster::new(1.0)),
                Arc::new(wave),
                (1.0, 1.0),
                None,
                expected,
            )
        }
    };
    Ok(setup)
}

fn pair(
    origin: Vec<f64>,
    reference: Arc<dyn Integrand<Vec<f64>>>,
    target: Arc<dyn Integrand<Vec<f64>>>,
    steps: (f64, f64),
    expected_ratio: Option<f64>,
    expected_integral_ratio: f64,
) -> ScenarioSetup {
    let moves = |step: f64| MoveSet::new().with(Translation::new(step, 10.0 * step), 1.0);
    ScenarioSetup {
        reference: Ensemble::new(origin.clone(), reference.clone(), target.clone(), moves(steps.0)),
        target: Ensemble::new(origin, target, reference, moves(steps.1)),
        expected_ratio,
        expected_integral_ratio,
    }
}
