use mayer_core::errors::ErrorInfo;
use mayer_core::{EnsembleRole, MayerError};
use serde::{Deserialize, Serialize};

use crate::accumulator::{OverlapData, SlotStatistics};
use crate::calibrator::min_diff_location;
use crate::session::OverlapSession;

/// Per-ensemble statistics at the estimated bias.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDiagnostics {
    /// Ensemble described.
    pub role: EnsembleRole,
    /// Samples contributing to the averages.
    pub samples: u64,
    /// Completed blocks contributing to the errors.
    pub blocks: u64,
    /// Sign statistics of the ensemble's own integrand.
    pub sign: SlotStatistics,
    /// Overlap statistics at the estimated bias.
    pub overlap: OverlapData,
    /// Relative overlap error after the block-correlation correction.
    pub relative_error: f64,
}

/// Combined estimate of `Z_target / Z_reference`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioEstimate {
    /// Bias the estimate was read at.
    pub bias: f64,
    /// Ratio of the magnitude integrals.
    pub ratio: f64,
    /// Standard error of `ratio`.
    pub error: f64,
    /// Ratio of the signed integrals.
    pub integral_ratio: f64,
    /// Standard error of `integral_ratio`.
    pub integral_ratio_error: f64,
    /// Fraction of samples that came from the reference ensemble.
    pub actual_step_fraction: f64,
    /// Fraction that would minimise the error for the observed efficiencies.
    pub ideal_step_fraction: f64,
    /// Reference ensemble statistics.
    pub reference: EnsembleDiagnostics,
    /// Target ensemble statistics.
    pub target: EnsembleDiagnostics,
}

/// Estimates the ratio at the session's current bias.
///
/// With a single-point grid that point is used; otherwise the min-diff
/// location of the current grid.
pub fn estimate(session: &OverlapSession) -> Result<RatioEstimate, MayerError> {
    let grid_len = session.accumulator(EnsembleRole::Reference).grid().len();
    let index = if grid_len == 1 {
        0
    } else {
        min_diff_location(session)?
    };
    estimate_at(session, index)
}

/// Estimates the ratio at bias index `index`.
pub fn estimate_at(session: &OverlapSession, index: usize) -> Result<RatioEstimate, MayerError> {
    let reference = diagnostics(session, EnsembleRole::Reference, index)?;
    let target = diagnostics(session, EnsembleRole::Target, index)?;

    let ratio = reference.overlap.average / target.overlap.average;
    if !ratio.is_finite() || ratio == 0.0 {
        return Err(MayerError::Statistics(
            ErrorInfo::new("degenerate-ratio", "overlap averages do not form a usable ratio")
                .with_context("reference", reference.overlap.average.to_string())
                .with_context("target", target.overlap.average.to_string()),
        ));
    }
    let error = ratio.abs() * reference.relative_error.hypot(target.relative_error);

    let integral_ratio = reference.overlap.ratio / target.overlap.ratio;
    let integral_ratio_error = integral_ratio.abs()
        * (correlation_factor(reference.overlap.block_correlation) * reference.overlap.ratio_error
            / reference.overlap.ratio)
            .hypot(
                correlation_factor(target.overlap.block_correlation) * target.overlap.ratio_error
                    / target.overlap.ratio,
            );

    let n0 = reference.samples as f64;
    let n1 = target.samples as f64;
    Ok(RatioEstimate {
        bias: reference.overlap.bias,
        ratio,
        error,
        integral_ratio,
        integral_ratio_error,
        actual_step_fraction: n0 / (n0 + n1),
        ideal_step_fraction: ideal_step_fraction(
            reference.relative_error,
            reference.samples,
            target.relative_error,
            target.samples,
        ),
        reference,
        target,
    })
}

fn diagnostics(
    session: &OverlapSession,
    role: EnsembleRole,
    index: usize,
) -> Result<EnsembleDiagnostics, MayerError> {
    let accumulator = session.accumulator(role);
    if accumulator.sample_count() == 0 {
        return Err(MayerError::Statistics(
            ErrorInfo::new("no-samples", "ensemble has not produced samples yet")
                .with_context("role", role.as_str()),
        ));
    }
    let overlap = accumulator.data(index).ok_or_else(|| {
        MayerError::Statistics(
            ErrorInfo::new("bias-index", "bias index outside the current grid")
                .with_context("index", index.to_string())
                .with_context("points", accumulator.grid().len().to_string()),
        )
    })?;
    let relative_error =
        correlation_factor(overlap.block_correlation) * overlap.error / overlap.average;
    Ok(EnsembleDiagnostics {
        role,
        samples: accumulator.sample_count(),
        blocks: accumulator.block_count(),
        sign: accumulator.sign_data(),
        overlap,
        relative_error,
    })
}

/// Inflation of a block error for lag-1 correlation `rho`; only positive
/// correlations below one are corrected.
pub fn correlation_factor(rho: f64) -> f64 {
    if rho > 0.0 && rho < 1.0 {
        ((1.0 + rho) / (1.0 - rho)).sqrt()
    } else {
        1.0
    }
}

/// Reference share `e0·√n0 / (e0·√n0 + e1·√n1)` that balances the two
/// relative errors. NaN when the inputs do not determine a fraction.
pub fn ideal_step_fraction(
    reference_error: f64,
    reference_steps: u64,
    target_error: f64,
    target_steps: u64,
) -> f64 {
    let a = reference_error.abs() * (reference_steps as f64).sqrt();
    let b = target_error.abs() * (target_steps as f64).sqrt();
    let fraction = a / (a + b);
    if fraction.is_finite() {
        fraction
    } else {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::BiasGrid;
    use mayer_core::ClusterSample;

    #[test]
    fn correlation_correction_is_bounded() {
        assert_eq!(correlation_factor(-0.3), 1.0);
        assert_eq!(correlation_factor(0.0), 1.0);
        assert_eq!(correlation_factor(1.0), 1.0);
        assert!((correlation_factor(0.6) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ideal_fraction_balances_errors() {
        assert!((ideal_step_fraction(0.1, 100, 0.1, 100) - 0.5).abs() < 1e-12);
        let f = ideal_step_fraction(0.3, 100, 0.1, 100);
        assert!((f - 0.75).abs() < 1e-12);
        assert!(ideal_step_fraction(0.0, 0, 0.0, 0).is_nan());
    }

    #[test]
    fn empty_ensemble_cannot_be_estimated() {
        let mut session = OverlapSession::new(BiasGrid::single(1.0).unwrap(), 10, 0.5, false);
        session.record(
            EnsembleRole::Reference,
            ClusterSample {
                sampled: 1.0,
                perturbed: 2.0,
            },
        );
        let err = estimate(&session).unwrap_err();
        assert_eq!(err.info().code, "no-samples");
    }

    #[test]
    fn exact_proportional_samples_give_exact_ratio() {
        let mut session = OverlapSession::new(BiasGrid::single(3.0).unwrap(), 5, 0.5, false);
        for _ in 0..20 {
            session.record(
                EnsembleRole::Reference,
                ClusterSample {
                    sampled: 0.5,
                    perturbed: 1.5,
                },
            );
            session.record(
                EnsembleRole::Target,
                ClusterSample {
                    sampled: -1.5,
                    perturbed: 0.5,
                },
            );
        }
        let estimate = estimate(&session).unwrap();
        assert!((estimate.ratio - 3.0).abs() < 1e-12);
        assert!(estimate.error < 1e-6);
        assert!((estimate.integral_ratio + 3.0).abs() < 1e-12);
        assert!((estimate.actual_step_fraction - 0.5).abs() < 1e-12);
        assert_eq!(estimate.reference.blocks, 4);
    }
}
