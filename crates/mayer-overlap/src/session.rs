use mayer_core::{ClusterSample, EnsembleRole};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accumulator::{BiasGrid, OverlapAccumulator};

/// Calibrated bias, or the absence of one while the calibrator is searching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "kebab-case")]
pub enum RefPref {
    /// No bias accepted yet.
    Searching,
    /// Bias accepted by the calibrator or read from the calibration file.
    Calibrated(f64),
}

impl RefPref {
    /// Returns the calibrated value, if any.
    pub fn value(self) -> Option<f64> {
        match self {
            RefPref::Searching => None,
            RefPref::Calibrated(value) => Some(value),
        }
    }

    /// Whether a bias has been accepted.
    pub fn is_calibrated(self) -> bool {
        matches!(self, RefPref::Calibrated(_))
    }
}

/// Phase of the calibration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationPhase {
    /// Wide geometric grid around the initial guess.
    SearchWide,
    /// Narrow grid around the provisional bias.
    Narrow,
    /// Single bias; samples are production statistics.
    Final,
}

impl CalibrationPhase {
    /// Lowercase label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationPhase::SearchWide => "search-wide",
            CalibrationPhase::Narrow => "narrow",
            CalibrationPhase::Final => "final",
        }
    }
}

/// Mutable state shared by the coordinator, calibrator and estimator.
#[derive(Debug, Clone)]
pub struct OverlapSession {
    phase: CalibrationPhase,
    ref_pref: RefPref,
    ref_step_fraction: f64,
    pinned: bool,
    accumulators: [OverlapAccumulator; 2],
    phase_steps: [u64; 2],
    total_steps: [u64; 2],
}

impl OverlapSession {
    /// Session in the wide-search phase over `grid`.
    pub fn new(grid: BiasGrid, block_size: usize, ref_step_fraction: f64, pinned: bool) -> Self {
        Self {
            phase: CalibrationPhase::SearchWide,
            ref_pref: RefPref::Searching,
            ref_step_fraction,
            pinned,
            accumulators: [
                OverlapAccumulator::new(EnsembleRole::Reference, grid.clone(), block_size),
                OverlapAccumulator::new(EnsembleRole::Target, grid, block_size),
            ],
            phase_steps: [0; 2],
            total_steps: [0; 2],
        }
    }

    /// Moves to `phase`, replacing both accumulators with empty ones over
    /// `grid`. Everything accumulated in the previous phase is dropped.
    pub fn enter_phase(&mut self, phase: CalibrationPhase, grid: BiasGrid, block_size: usize) {
        debug!(
            phase = phase.as_str(),
            points = grid.len(),
            block_size,
            "rebuilding overlap accumulators"
        );
        self.phase = phase;
        self.accumulators = [
            OverlapAccumulator::new(EnsembleRole::Reference, grid.clone(), block_size),
            OverlapAccumulator::new(EnsembleRole::Target, grid, block_size),
        ];
        self.phase_steps = [0; 2];
    }

    /// Resets both accumulators to `block_size`, discarding their data.
    pub fn set_block_size(&mut self, block_size: usize) {
        for accumulator in &mut self.accumulators {
            accumulator.set_block_size(block_size);
        }
        self.phase_steps = [0; 2];
    }

    /// Pushes one sample of `role` into its accumulator.
    pub fn record(&mut self, role: EnsembleRole, sample: ClusterSample) {
        let idx = role.index();
        self.accumulators[idx].add_sample(sample);
        self.phase_steps[idx] += 1;
        self.total_steps[idx] += 1;
    }

    /// Current calibration phase.
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Current bias state.
    pub fn ref_pref(&self) -> RefPref {
        self.ref_pref
    }

    /// Stores the accepted bias.
    pub fn set_ref_pref(&mut self, ref_pref: RefPref) {
        self.ref_pref = ref_pref;
    }

    /// Fraction of macro steps given to the reference ensemble.
    pub fn ref_step_fraction(&self) -> f64 {
        self.ref_step_fraction
    }

    /// Overrides the step fraction. Ignored while pinned.
    pub fn set_ref_step_fraction(&mut self, fraction: f64) {
        if !self.pinned {
            self.ref_step_fraction = fraction;
        }
    }

    /// Whether the step fraction is fixed for the whole run.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Accumulator of `role`.
    pub fn accumulator(&self, role: EnsembleRole) -> &OverlapAccumulator {
        &self.accumulators[role.index()]
    }

    /// Steps of `role` recorded since the accumulators were last reset.
    pub fn phase_steps(&self, role: EnsembleRole) -> u64 {
        self.phase_steps[role.index()]
    }

    /// Steps of `role` over the whole session.
    pub fn total_steps(&self, role: EnsembleRole) -> u64 {
        self.total_steps[role.index()]
    }

    /// Whether both accumulators hold only finite averages.
    pub fn averages_finite(&self) -> bool {
        self.accumulators.iter().all(OverlapAccumulator::averages_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClusterSample {
        ClusterSample {
            sampled: 1.0,
            perturbed: 2.0,
        }
    }

    #[test]
    fn entering_a_phase_discards_samples() {
        let grid = BiasGrid::geometric(1.0, 30.0, 21).unwrap();
        let mut session = OverlapSession::new(grid, 10, 0.5, false);
        for _ in 0..25 {
            session.record(EnsembleRole::Reference, sample());
        }
        assert_eq!(session.accumulator(EnsembleRole::Reference).sample_count(), 25);
        session.enter_phase(CalibrationPhase::Final, BiasGrid::single(2.0).unwrap(), 10);
        assert_eq!(session.phase(), CalibrationPhase::Final);
        assert_eq!(session.accumulator(EnsembleRole::Reference).sample_count(), 0);
        assert_eq!(session.accumulator(EnsembleRole::Reference).grid().len(), 1);
        assert_eq!(session.phase_steps(EnsembleRole::Reference), 0);
        assert_eq!(session.total_steps(EnsembleRole::Reference), 25);
    }

    #[test]
    fn pinned_fraction_is_not_overridden() {
        let grid = BiasGrid::single(1.0).unwrap();
        let mut session = OverlapSession::new(grid.clone(), 10, 0.3, true);
        session.set_ref_step_fraction(0.9);
        assert_eq!(session.ref_step_fraction(), 0.3);
        let mut free = OverlapSession::new(grid, 10, 0.3, false);
        free.set_ref_step_fraction(0.9);
        assert_eq!(free.ref_step_fraction(), 0.9);
    }

    #[test]
    fn ref_pref_reports_calibration() {
        assert_eq!(RefPref::Searching.value(), None);
        assert!(RefPref::Calibrated(2.0).is_calibrated());
        assert_eq!(RefPref::Calibrated(2.0).value(), Some(2.0));
    }
}
