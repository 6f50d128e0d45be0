use mayer_core::errors::ErrorInfo;
use mayer_core::{EnsembleRole, MayerError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accumulator::BiasGrid;
use crate::config::CalibrationConfig;
use crate::coordinator::{OverlapCoordinator, SamplingMode};
use crate::session::{CalibrationPhase, OverlapSession, RefPref};
use crate::store::CalibrationStore;

/// Where the calibrated bias came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationSource {
    /// Read from the calibration file; no search was run.
    Persisted,
    /// Located by the wide and narrow searches.
    Searched,
}

/// Result of one search phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    /// Phase that ran.
    pub phase: CalibrationPhase,
    /// Grid centre.
    pub center: f64,
    /// First and last grid value.
    pub range: (f64, f64),
    /// Steps sampled across both ensembles.
    pub steps: u64,
    /// Index of the min-diff location.
    pub min_diff_index: usize,
    /// Whether the location sat on the grid edge.
    pub at_edge: bool,
    /// Bias estimate produced by the phase.
    pub ref_pref: f64,
}

/// Outcome of [`Calibrator::calibrate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    /// Accepted bias.
    pub ref_pref: f64,
    /// Origin of the bias.
    pub source: CalibrationSource,
    /// Search phases in execution order; empty when the bias was persisted.
    pub phases: Vec<PhaseSummary>,
}

/// Index where the bias-scaled overlap averages of the two ensembles agree
/// best, `argmin_i |ln(avg0_i / (c_i·avg1_i))|`. Non-finite candidates are
/// skipped.
pub fn min_diff_location(session: &OverlapSession) -> Result<usize, MayerError> {
    let reference = session.accumulator(EnsembleRole::Reference);
    let target = session.accumulator(EnsembleRole::Target);
    let mut best: Option<(usize, f64)> = None;
    for (idx, &bias) in reference.grid().values().iter().enumerate() {
        let diff = (reference.overlap_average(idx) / (bias * target.overlap_average(idx)))
            .ln()
            .abs();
        if !diff.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, current)| diff < current) {
            best = Some((idx, diff));
        }
    }
    best.map(|(idx, _)| idx).ok_or_else(|| {
        MayerError::Calibration(
            ErrorInfo::new("oops", "no trial bias produced finite overlap averages")
                .with_context("points", reference.grid().len().to_string())
                .with_context("reference-samples", reference.sample_count().to_string())
                .with_context("target-samples", target.sample_count().to_string()),
        )
    })
}

/// Ratio of overlap averages at `index`, rejected unless finite and nonzero.
pub fn ref_pref_at(session: &OverlapSession, index: usize) -> Result<f64, MayerError> {
    let avg0 = session
        .accumulator(EnsembleRole::Reference)
        .overlap_average(index);
    let avg1 = session.accumulator(EnsembleRole::Target).overlap_average(index);
    validate_ref_pref(avg0 / avg1)
}

/// Accepts a bias only if it is finite and nonzero.
pub fn validate_ref_pref(value: f64) -> Result<f64, MayerError> {
    if value.is_finite() && value != 0.0 {
        Ok(value)
    } else {
        Err(MayerError::Calibration(
            ErrorInfo::new("oops", "calibrated bias is zero or not finite")
                .with_context("ref-pref", value.to_string())
                .with_hint("the two integrands probably never overlap"),
        ))
    }
}

/// Drives the wide/narrow/final bias search over a coordinator.
#[derive(Debug)]
pub struct Calibrator<'a> {
    config: &'a CalibrationConfig,
    store: Option<&'a CalibrationStore>,
}

impl<'a> Calibrator<'a> {
    /// Calibrator reading and persisting through `store`, when given.
    pub fn new(config: &'a CalibrationConfig, store: Option<&'a CalibrationStore>) -> Self {
        Self { config, store }
    }

    /// Runs the calibration and leaves the coordinator's session in the
    /// final phase with one bias equal to the accepted value.
    pub fn calibrate<C>(
        &self,
        coordinator: &mut OverlapCoordinator<C>,
    ) -> Result<CalibrationOutcome, MayerError> {
        if let Some(value) = self.store.and_then(CalibrationStore::load) {
            info!(ref_pref = value, "using persisted calibration");
            self.finalize(coordinator, value)?;
            return Ok(CalibrationOutcome {
                ref_pref: value,
                source: CalibrationSource::Persisted,
                phases: Vec::new(),
            });
        }

        let mut phases = Vec::new();
        let wide = self.search(
            coordinator,
            CalibrationPhase::SearchWide,
            self.config.initial_ref_pref,
            self.config.wide_span,
            self.config.wide_points,
            self.config.search_steps,
        )?;
        let mut ref_pref = wide.ref_pref;
        phases.push(wide);

        for iteration in 1..=self.config.max_narrow_iterations {
            let narrow = self.search(
                coordinator,
                CalibrationPhase::Narrow,
                ref_pref,
                self.config.narrow_span,
                self.config.narrow_points,
                self.config.narrow_steps,
            )?;
            ref_pref = narrow.ref_pref;
            let at_edge = narrow.at_edge;
            phases.push(narrow);
            if !at_edge {
                break;
            }
            if iteration == self.config.max_narrow_iterations {
                warn!(
                    iterations = iteration,
                    ref_pref, "narrow search exhausted with the minimum on a grid edge"
                );
            } else {
                debug!(iteration, ref_pref, "narrow minimum on grid edge");
            }
        }

        self.finalize(coordinator, ref_pref)?;
        if let Some(store) = self.store {
            store.store(ref_pref)?;
        }
        info!(ref_pref, phases = phases.len(), "calibration complete");
        Ok(CalibrationOutcome {
            ref_pref,
            source: CalibrationSource::Searched,
            phases,
        })
    }

    fn search<C>(
        &self,
        coordinator: &mut OverlapCoordinator<C>,
        phase: CalibrationPhase,
        center: f64,
        span: f64,
        points: usize,
        steps: u64,
    ) -> Result<PhaseSummary, MayerError> {
        let grid = BiasGrid::geometric(center, span, points)?;
        let range = (grid.values()[0], grid.values()[grid.len() - 1]);
        coordinator
            .session_mut()
            .enter_phase(phase, grid, self.config.block_size);
        let taken = coordinator.run(steps, SamplingMode::Equilibration, None)?;
        let session = coordinator.session();
        let index = min_diff_location(session)?;
        let ref_pref = ref_pref_at(session, index)?;
        let at_edge = session
            .accumulator(EnsembleRole::Reference)
            .grid()
            .is_edge(index);
        info!(
            phase = phase.as_str(),
            center,
            index,
            at_edge,
            ref_pref,
            "bias search phase finished"
        );
        Ok(PhaseSummary {
            phase,
            center,
            range,
            steps: taken,
            min_diff_index: index,
            at_edge,
            ref_pref,
        })
    }

    fn finalize<C>(
        &self,
        coordinator: &mut OverlapCoordinator<C>,
        value: f64,
    ) -> Result<(), MayerError> {
        let value = validate_ref_pref(value)?;
        let session = coordinator.session_mut();
        session.set_ref_pref(RefPref::Calibrated(value));
        session.enter_phase(
            CalibrationPhase::Final,
            BiasGrid::single(value)?,
            self.config.block_size,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mayer_core::ClusterSample;

    fn session_with(reference: ClusterSample, target: ClusterSample) -> OverlapSession {
        let grid = BiasGrid::geometric(1.0, 10.0, 21).unwrap();
        let mut session = OverlapSession::new(grid, 10, 0.5, false);
        for _ in 0..50 {
            session.record(EnsembleRole::Reference, reference);
            session.record(EnsembleRole::Target, target);
        }
        session
    }

    #[test]
    fn min_diff_finds_bias_equal_to_ratio() {
        // Constant integrands 1 and 2 put the agreement point at c = 2.
        let session = session_with(
            ClusterSample {
                sampled: 1.0,
                perturbed: 2.0,
            },
            ClusterSample {
                sampled: 2.0,
                perturbed: 1.0,
            },
        );
        let index = min_diff_location(&session).unwrap();
        let grid = session.accumulator(EnsembleRole::Reference).grid();
        let nearest = grid
            .values()
            .iter()
            .enumerate()
            .min_by(|a, b| {
                (a.1.ln() - 2f64.ln())
                    .abs()
                    .total_cmp(&(b.1.ln() - 2f64.ln()).abs())
            })
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(index, nearest);
        assert!((ref_pref_at(&session, index).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_overlap_is_fatal() {
        let session = session_with(
            ClusterSample {
                sampled: 1.0,
                perturbed: 0.0,
            },
            ClusterSample {
                sampled: 2.0,
                perturbed: 0.0,
            },
        );
        let err = min_diff_location(&session).unwrap_err();
        assert!(matches!(err, MayerError::Calibration(_)));
        assert_eq!(err.info().code, "oops");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(validate_ref_pref(0.0).is_err());
        assert!(validate_ref_pref(f64::NAN).is_err());
        assert!(validate_ref_pref(f64::INFINITY).is_err());
        assert_eq!(validate_ref_pref(2.5).unwrap(), 2.5);
    }
}
