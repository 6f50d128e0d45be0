use std::sync::Arc;

use mayer_core::Integrand;
use mayer_overlap::toy::GaussianCluster;
use mayer_overlap::{run, Ensemble, MoveSet, OverlapConfig, RunSummary, Translation};

fn deterministic_config(seed: u64) -> OverlapConfig {
    let mut config = OverlapConfig::default();
    config.seed_policy.master_seed = seed;
    config.sampling.sub_steps = 250;
    config.sampling.report_interval = 4;
    config.calibration.search_steps = 5_000;
    config.calibration.narrow_steps = 5_000;
    config.calibration.equilibration_steps = 1_000;
    config.production.steps = 20_000;
    config
}

fn run_once(seed: u64) -> RunSummary {
    let narrow: Arc<dyn Integrand<Vec<f64>>> = Arc::new(GaussianCluster::new(1.0));
    let wide: Arc<dyn Integrand<Vec<f64>>> = Arc::new(GaussianCluster::new(1.5));
    let reference = Ensemble::new(
        vec![0.0, 0.0],
        narrow.clone(),
        wide.clone(),
        MoveSet::new().with(Translation::new(1.0, 5.0), 1.0),
    );
    let target = Ensemble::new(
        vec![0.0, 0.0],
        wide,
        narrow,
        MoveSet::new().with(Translation::new(1.0, 5.0), 1.0),
    );
    run(&deterministic_config(seed), reference, target).unwrap()
}

#[test]
fn repeated_runs_with_same_seed_match() {
    let first = run_once(99);
    let second = run_once(99);
    assert_eq!(first.calibration, second.calibration);
    assert_eq!(first.estimate.ratio, second.estimate.ratio);
    assert_eq!(first.estimate.error, second.estimate.error);
    assert_eq!(first.progress, second.progress);
    assert_eq!(first.acceptance_rates, second.acceptance_rates);
    assert_eq!(first.step_sizes, second.step_sizes);
    assert!(!first.progress.is_empty());
}

#[test]
fn different_seeds_diverge() {
    let a = run_once(1);
    let b = run_once(2);
    assert_ne!(a.estimate.ratio, b.estimate.ratio);
    let expected = 1.5f64.powi(2);
    for summary in [&a, &b] {
        assert!((summary.estimate.ratio / expected - 1.0).abs() < 0.1);
    }
}
