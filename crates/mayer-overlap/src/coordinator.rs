use mayer_core::errors::ErrorInfo;
use mayer_core::{EnsembleRole, MayerError, RngHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accumulator::BiasGrid;
use crate::config::{OverlapConfig, SamplingConfig};
use crate::determinism;
use crate::estimator::{self, RatioEstimate};
use crate::progress::{ProgressRecord, ProgressSink};
use crate::sampler::{Ensemble, EnsembleSampler};
use crate::session::OverlapSession;

/// How the coordinator treats the steps of a [`OverlapCoordinator::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingMode {
    /// Move steps are tuned; the step fraction stays fixed.
    Equilibration,
    /// Moves are frozen; the step fraction adapts, averages are checked and
    /// progress is reported.
    Production,
}

/// Interleaves the reference and target samplers and owns the session.
pub struct OverlapCoordinator<C> {
    samplers: [EnsembleSampler<C>; 2],
    session: OverlapSession,
    coin: RngHandle,
    sampling: SamplingConfig,
    production_macro_steps: u64,
}

impl<C> OverlapCoordinator<C> {
    /// Builds both samplers and walks each to a configuration with nonzero
    /// weight. The session starts in the wide search over the configured grid.
    pub fn new(
        reference: Ensemble<C>,
        target: Ensemble<C>,
        config: &OverlapConfig,
    ) -> Result<Self, MayerError> {
        config.validate()?;
        let seed = config.seed_policy.master_seed;
        let mut samplers = [
            EnsembleSampler::new(
                EnsembleRole::Reference,
                reference,
                determinism::ensemble_rng(seed, EnsembleRole::Reference),
            ),
            EnsembleSampler::new(
                EnsembleRole::Target,
                target,
                determinism::ensemble_rng(seed, EnsembleRole::Target),
            ),
        ];
        for sampler in &mut samplers {
            let attempts = sampler.initialize(config.init.max_attempts)?;
            if attempts > 0 {
                info!(
                    role = sampler.role().as_str(),
                    attempts, "moved off zero-weight start"
                );
            }
        }
        let calibration = &config.calibration;
        let grid = BiasGrid::geometric(
            calibration.initial_ref_pref,
            calibration.wide_span,
            calibration.wide_points,
        )?;
        let session = OverlapSession::new(
            grid,
            calibration.block_size,
            config.sampling.ref_step_fraction,
            config.sampling.pin_step_fraction,
        );
        Ok(Self {
            samplers,
            session,
            coin: RngHandle::from_seed(determinism::coordinator_seed(seed)),
            sampling: config.sampling.clone(),
            production_macro_steps: 0,
        })
    }

    /// Runs at most `max_steps` sampler steps and returns how many ran.
    ///
    /// Each macro step flips the coin once and gives `sub_steps` steps (or
    /// what is left of the budget) to the chosen ensemble. When the budget
    /// spans at least two macro-steps both ensembles receive samples.
    pub fn run(
        &mut self,
        max_steps: u64,
        mode: SamplingMode,
        mut sink: Option<&mut dyn ProgressSink>,
    ) -> Result<u64, MayerError> {
        let tuning = mode == SamplingMode::Equilibration;
        let mut taken = 0u64;
        while taken < max_steps {
            let chunk = (max_steps - taken).min(self.sampling.sub_steps);
            let mut role = if self.coin.uniform() < self.session.ref_step_fraction() {
                EnsembleRole::Reference
            } else {
                EnsembleRole::Target
            };
            // The last macro-step of a call goes to an ensemble the phase has
            // not sampled yet.
            if taken + chunk == max_steps
                && self.session.phase_steps(role) > 0
                && self.session.phase_steps(role.other()) == 0
            {
                role = role.other();
            }
            let sampler = &mut self.samplers[role.index()];
            for _ in 0..chunk {
                let sample = sampler.step(tuning)?;
                self.session.record(role, sample);
            }
            taken += chunk;

            if mode == SamplingMode::Production {
                if let Some(record) = self.after_production_macro_step()? {
                    if let Some(sink) = sink.as_mut() {
                        sink.report(record);
                    }
                }
            }
        }
        Ok(taken)
    }

    fn after_production_macro_step(&mut self) -> Result<Option<ProgressRecord>, MayerError> {
        if !self.session.averages_finite() {
            return Err(MayerError::Statistics(
                ErrorInfo::new("non-finite-average", "accumulated average is not finite")
                    .with_context(
                        "production-steps",
                        self.production_steps().to_string(),
                    ),
            ));
        }
        self.production_macro_steps += 1;
        let count = self.production_macro_steps;
        if !self.session.is_pinned()
            && self.sampling.adjust_interval > 0
            && count % self.sampling.adjust_interval == 0
        {
            self.adjust_step_fraction();
        }
        if self.sampling.report_interval == 0 || count % self.sampling.report_interval != 0 {
            return Ok(None);
        }
        match estimator::estimate(&self.session) {
            Ok(estimate) => Ok(Some(ProgressRecord {
                step_count: self.production_steps(),
                ratio: estimate.ratio,
                error: estimate.error,
            })),
            Err(err) => {
                debug!(error = %err, "skipping progress record");
                Ok(None)
            }
        }
    }

    fn adjust_step_fraction(&mut self) {
        let Ok(estimate) = estimator::estimate(&self.session) else {
            return;
        };
        let ideal = estimate.ideal_step_fraction;
        if !ideal.is_finite() {
            return;
        }
        let min = self.sampling.min_step_fraction;
        let fraction = ideal.clamp(min, 1.0 - min);
        debug!(
            previous = self.session.ref_step_fraction(),
            fraction, "adjusting reference step fraction"
        );
        self.session.set_ref_step_fraction(fraction);
    }

    /// Samples accumulated since the session's last reset, both ensembles.
    pub fn production_steps(&self) -> u64 {
        EnsembleRole::ALL
            .iter()
            .map(|&role| self.session.phase_steps(role))
            .sum()
    }

    /// Clears production data and restarts it with `block_size`.
    pub fn reset_statistics(&mut self, block_size: usize) {
        self.session.set_block_size(block_size);
        self.production_macro_steps = 0;
    }

    /// Shared session state.
    pub fn session(&self) -> &OverlapSession {
        &self.session
    }

    /// Mutable session state for the calibrator.
    pub fn session_mut(&mut self) -> &mut OverlapSession {
        &mut self.session
    }

    /// Sampler of `role`.
    pub fn sampler(&self, role: EnsembleRole) -> &EnsembleSampler<C> {
        &self.samplers[role.index()]
    }

    /// Ratio estimate from the current session.
    pub fn estimate(&self) -> Result<RatioEstimate, MayerError> {
        estimator::estimate(&self.session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::{MoveSet, Translation};
    use crate::toy::GaussianCluster;
    use std::sync::Arc;

    fn coordinator(config: &OverlapConfig) -> OverlapCoordinator<Vec<f64>> {
        let narrow = Arc::new(GaussianCluster::new(1.0));
        let wide = Arc::new(GaussianCluster::new(2.0));
        let reference = Ensemble::new(
            vec![0.0],
            narrow.clone(),
            wide.clone(),
            MoveSet::new().with(Translation::new(1.0, 4.0), 1.0),
        );
        let target = Ensemble::new(
            vec![0.0],
            wide,
            narrow,
            MoveSet::new().with(Translation::new(2.0, 8.0), 1.0),
        );
        OverlapCoordinator::new(reference, target, config).unwrap()
    }

    #[test]
    fn budget_is_never_exceeded() {
        let mut config = OverlapConfig::default();
        config.sampling.sub_steps = 300;
        let mut coord = coordinator(&config);
        let taken = coord.run(1000, SamplingMode::Equilibration, None).unwrap();
        assert_eq!(taken, 1000);
        let total: u64 = EnsembleRole::ALL
            .iter()
            .map(|&role| coord.sampler(role).steps())
            .sum();
        assert_eq!(total, 1000);
        assert_eq!(coord.production_steps(), 1000);
    }

    #[test]
    fn pinned_fraction_is_respected() {
        let mut config = OverlapConfig::default();
        config.sampling.sub_steps = 10;
        config.sampling.ref_step_fraction = 0.8;
        config.sampling.pin_step_fraction = true;
        config.sampling.adjust_interval = 1;
        let mut coord = coordinator(&config);
        coord.run(20_000, SamplingMode::Production, None).unwrap();
        let n0 = coord.session().phase_steps(EnsembleRole::Reference) as f64;
        assert_eq!(coord.session().ref_step_fraction(), 0.8);
        assert!((n0 / 20_000.0 - 0.8).abs() < 0.05, "fraction {}", n0 / 20_000.0);
    }

    #[test]
    fn production_reports_progress() {
        let mut config = OverlapConfig::default();
        config.sampling.sub_steps = 100;
        config.sampling.report_interval = 10;
        let mut coord = coordinator(&config);
        coord
            .session_mut()
            .enter_phase(
                crate::session::CalibrationPhase::Final,
                BiasGrid::single(2.0).unwrap(),
                10,
            );
        let mut records = Vec::new();
        coord
            .run(10_000, SamplingMode::Production, Some(&mut records))
            .unwrap();
        assert!(!records.is_empty() && records.len() <= 10);
        assert!(records.windows(2).all(|w| w[0].step_count < w[1].step_count));
        assert_eq!(records.last().map(|r| r.step_count), Some(10_000));
    }

    #[test]
    fn adaptation_stays_within_bounds() {
        let mut config = OverlapConfig::default();
        config.sampling.sub_steps = 50;
        config.sampling.adjust_interval = 2;
        config.sampling.min_step_fraction = 0.2;
        let mut coord = coordinator(&config);
        coord
            .session_mut()
            .enter_phase(
                crate::session::CalibrationPhase::Final,
                BiasGrid::single(2.0).unwrap(),
                10,
            );
        coord.run(20_000, SamplingMode::Production, None).unwrap();
        let fraction = coord.session().ref_step_fraction();
        assert!((0.2..=0.8).contains(&fraction));
    }

    #[test]
    fn lopsided_fraction_still_samples_both_ensembles() {
        let mut config = OverlapConfig::default();
        config.sampling.sub_steps = 100;
        config.sampling.ref_step_fraction = 0.01;
        let mut coord = coordinator(&config);
        coord.run(200, SamplingMode::Equilibration, None).unwrap();
        for role in EnsembleRole::ALL {
            assert_eq!(coord.session().phase_steps(role), 100);
        }
    }
}
