use mayer_core::errors::ErrorInfo;
use mayer_core::{ClusterSample, EnsembleRole, MayerError};
use serde::{Deserialize, Serialize};

/// Ordered set of trial bias values (Bennett parameters).
///
/// Values are strictly positive and strictly increasing; a grid with one
/// point is the finalized bias used for production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasGrid {
    values: Vec<f64>,
}

impl BiasGrid {
    /// Builds `points` geometrically spaced values spanning
    /// `[center / span, center * span]`.
    pub fn geometric(center: f64, span: f64, points: usize) -> Result<Self, MayerError> {
        if !(center.is_finite() && center > 0.0) {
            return Err(MayerError::Config(
                grid_error("grid-center", "bias center must be finite and positive")
                    .with_context("center", center.to_string()),
            ));
        }
        if points == 0 {
            return Err(MayerError::Config(grid_error(
                "grid-points",
                "bias grid needs at least one point",
            )));
        }
        if points == 1 {
            return Ok(Self {
                values: vec![center],
            });
        }
        if !(span.is_finite() && span > 1.0) {
            return Err(MayerError::Config(
                grid_error(
                    "grid-span",
                    "bias span must exceed 1 when more than one point is requested",
                )
                .with_context("span", span.to_string())
                .with_context("points", points.to_string()),
            ));
        }
        let last = (points - 1) as f64;
        let values = (0..points)
            .map(|idx| center * span.powf(2.0 * idx as f64 / last - 1.0))
            .collect();
        Ok(Self { values })
    }

    /// Grid holding exactly one bias value.
    pub fn single(value: f64) -> Result<Self, MayerError> {
        Self::geometric(value, 1.0, 1)
    }

    /// Returns the bias values in increasing order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of trial bias values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; grids are never empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the bias at `index`.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Whether `index` is the first or last point of a multi-point grid.
    pub fn is_edge(&self, index: usize) -> bool {
        self.values.len() > 1 && (index == 0 || index + 1 == self.values.len())
    }
}

fn grid_error(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
}

/// Overlap weight of one sample at trial bias `bias`.
///
/// With `γ_os = π0·π1 / (π1 + bias·π0)` the reference ensemble records
/// `γ_os/π0` and the target ensemble records `γ_os/π1`, so that
/// `⟨w⟩_reference / ⟨w⟩_target` estimates `Z_target / Z_reference` for any
/// positive bias.
pub fn overlap_weight(role: EnsembleRole, sample: ClusterSample, bias: f64) -> f64 {
    let own = sample.sampled.abs();
    let other = sample.perturbed.abs();
    let denominator = match role {
        EnsembleRole::Reference => other + bias * own,
        EnsembleRole::Target => own + bias * other,
    };
    if denominator > 0.0 {
        other / denominator
    } else {
        0.0
    }
}

fn sign_of(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Statistics of one accumulated quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotStatistics {
    /// Mean over every sample added since the last reset.
    pub average: f64,
    /// Standard deviation of individual samples.
    pub stdev: f64,
    /// Standard error of the mean estimated from block averages.
    pub error: f64,
    /// Lag-1 correlation between consecutive block averages.
    pub block_correlation: f64,
}

/// Statistic bundle for one trial bias value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapData {
    /// Trial bias value.
    pub bias: f64,
    /// Average overlap weight.
    pub average: f64,
    /// Standard deviation of the overlap weight.
    pub stdev: f64,
    /// Standard error of the average overlap weight.
    pub error: f64,
    /// Overlap average divided by the sign average.
    pub ratio: f64,
    /// Error of `ratio`, including the covariance of both block averages.
    pub ratio_error: f64,
    /// Lag-1 block correlation of the overlap weight.
    pub block_correlation: f64,
}

/// Two-level block statistics over a fixed number of parallel slots.
///
/// Samples are summed into the current block; every `block_size` samples the
/// block is frozen into block averages that feed the error, covariance and
/// correlation estimates. Partial blocks only contribute to the plain sample
/// average and standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockAccumulator {
    block_size: usize,
    block_fill: usize,
    block_sum: Vec<f64>,
    samples: u64,
    raw_sum: Vec<f64>,
    raw_sum_sq: Vec<f64>,
    blocks: u64,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    cross_first: Vec<f64>,
    lag_sum: Vec<f64>,
    first: Vec<f64>,
    last: Vec<f64>,
}

impl BlockAccumulator {
    /// Creates an empty accumulator for `slots` parallel quantities.
    pub fn new(slots: usize, block_size: usize) -> Self {
        let zeros = vec![0.0; slots];
        Self {
            block_size: block_size.max(1),
            block_fill: 0,
            block_sum: zeros.clone(),
            samples: 0,
            raw_sum: zeros.clone(),
            raw_sum_sq: zeros.clone(),
            blocks: 0,
            sum: zeros.clone(),
            sum_sq: zeros.clone(),
            cross_first: zeros.clone(),
            lag_sum: zeros.clone(),
            first: zeros.clone(),
            last: zeros,
        }
    }

    /// Number of slots.
    pub fn slots(&self) -> usize {
        self.sum.len()
    }

    /// Samples per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Samples added since the last reset.
    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    /// Completed blocks since the last reset.
    pub fn block_count(&self) -> u64 {
        self.blocks
    }

    /// Adds one sample vector; `values.len()` must equal [`Self::slots`].
    pub fn add(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.slots());
        for (slot, &value) in values.iter().enumerate() {
            self.block_sum[slot] += value;
            self.raw_sum[slot] += value;
            self.raw_sum_sq[slot] += value * value;
        }
        self.samples += 1;
        self.block_fill += 1;
        if self.block_fill == self.block_size {
            self.close_block();
        }
    }

    fn close_block(&mut self) {
        let size = self.block_size as f64;
        let head = self.block_sum[0] / size;
        for slot in 0..self.slots() {
            let mean = self.block_sum[slot] / size;
            if self.blocks == 0 {
                self.first[slot] = mean;
            } else {
                self.lag_sum[slot] += self.last[slot] * mean;
            }
            self.last[slot] = mean;
            self.sum[slot] += mean;
            self.sum_sq[slot] += mean * mean;
            self.cross_first[slot] += head * mean;
            self.block_sum[slot] = 0.0;
        }
        self.blocks += 1;
        self.block_fill = 0;
    }

    /// Statistics for `slot`. Quantities that need more data are NaN.
    pub fn statistics(&self, slot: usize) -> SlotStatistics {
        let n = self.samples as f64;
        let average = if self.samples == 0 {
            f64::NAN
        } else {
            self.raw_sum[slot] / n
        };
        let stdev = if self.samples == 0 {
            f64::NAN
        } else {
            (self.raw_sum_sq[slot] / n - average * average).max(0.0).sqrt()
        };
        SlotStatistics {
            average,
            stdev,
            error: self.block_error(slot),
            block_correlation: self.block_correlation(slot),
        }
    }

    fn block_mean(&self, slot: usize) -> f64 {
        self.sum[slot] / self.blocks as f64
    }

    fn block_variance(&self, slot: usize) -> f64 {
        let mean = self.block_mean(slot);
        (self.sum_sq[slot] / self.blocks as f64 - mean * mean).max(0.0)
    }

    fn block_error(&self, slot: usize) -> f64 {
        if self.blocks < 2 {
            return f64::NAN;
        }
        (self.block_variance(slot) / (self.blocks - 1) as f64).sqrt()
    }

    fn block_correlation(&self, slot: usize) -> f64 {
        if self.blocks < 3 {
            return f64::NAN;
        }
        let nb = self.blocks as f64;
        let mean = self.block_mean(slot);
        let variance = self.block_variance(slot);
        if variance <= 0.0 {
            return 0.0;
        }
        let numerator = self.lag_sum[slot]
            - mean * (2.0 * self.sum[slot] - self.first[slot] - self.last[slot])
            + (nb - 1.0) * mean * mean;
        numerator / ((nb - 1.0) * variance)
    }

    /// Covariance between the means of slot 0 and `slot`.
    pub fn mean_covariance(&self, slot: usize) -> f64 {
        if self.blocks < 2 {
            return f64::NAN;
        }
        let nb = self.blocks as f64;
        let cov = self.cross_first[slot] / nb - self.block_mean(0) * self.block_mean(slot);
        cov / (nb - 1.0)
    }
}

/// Per-ensemble accumulator of sign and overlap statistics.
///
/// Slot 0 holds the sign of the ensemble's own integrand; slot `i + 1` holds
/// the overlap weight at trial bias `grid[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapAccumulator {
    role: EnsembleRole,
    grid: BiasGrid,
    blocks: BlockAccumulator,
    scratch: Vec<f64>,
}

impl OverlapAccumulator {
    /// Creates an empty accumulator for `role` over `grid`.
    pub fn new(role: EnsembleRole, grid: BiasGrid, block_size: usize) -> Self {
        let slots = grid.len() + 1;
        Self {
            role,
            grid,
            blocks: BlockAccumulator::new(slots, block_size),
            scratch: vec![0.0; slots],
        }
    }

    /// Ensemble this accumulator belongs to.
    pub fn role(&self) -> EnsembleRole {
        self.role
    }

    /// Trial bias values covered by this accumulator.
    pub fn grid(&self) -> &BiasGrid {
        &self.grid
    }

    /// Samples per block.
    pub fn block_size(&self) -> usize {
        self.blocks.block_size()
    }

    /// Samples added since the last reset.
    pub fn sample_count(&self) -> u64 {
        self.blocks.sample_count()
    }

    /// Completed blocks since the last reset.
    pub fn block_count(&self) -> u64 {
        self.blocks.block_count()
    }

    /// Adds one sample, in chain order.
    pub fn add_sample(&mut self, sample: ClusterSample) {
        self.scratch[0] = sign_of(sample.sampled);
        for (idx, &bias) in self.grid.values().iter().enumerate() {
            self.scratch[idx + 1] = overlap_weight(self.role, sample, bias);
        }
        self.blocks.add(&self.scratch);
    }

    /// Changes the block size and discards everything accumulated so far,
    /// partial blocks included.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.blocks = BlockAccumulator::new(self.grid.len() + 1, block_size);
        self.scratch.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Statistics of the sign of the sampled integrand.
    pub fn sign_data(&self) -> SlotStatistics {
        self.blocks.statistics(0)
    }

    /// Average overlap weight at bias index `index`.
    pub fn overlap_average(&self, index: usize) -> f64 {
        self.blocks.statistics(index + 1).average
    }

    /// Full statistic bundle for bias index `index`.
    pub fn data(&self, index: usize) -> Option<OverlapData> {
        let bias = self.grid.get(index)?;
        let slot = index + 1;
        let overlap = self.blocks.statistics(slot);
        let sign = self.blocks.statistics(0);
        let ratio = overlap.average / sign.average;
        let relative = (overlap.error / overlap.average).powi(2)
            + (sign.error / sign.average).powi(2)
            - 2.0 * self.blocks.mean_covariance(slot) / (overlap.average * sign.average);
        Some(OverlapData {
            bias,
            average: overlap.average,
            stdev: overlap.stdev,
            error: overlap.error,
            ratio,
            ratio_error: ratio.abs() * relative.max(0.0).sqrt(),
            block_correlation: overlap.block_correlation,
        })
    }

    /// Whether every average seen so far is finite. Empty accumulators pass.
    pub fn averages_finite(&self) -> bool {
        if self.sample_count() == 0 {
            return true;
        }
        (0..self.blocks.slots()).all(|slot| self.blocks.statistics(slot).average.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometric_grid_spans_range() {
        let grid = BiasGrid::geometric(2.0, 10.0, 3).unwrap();
        let values = grid.values();
        assert!((values[0] - 0.2).abs() < 1e-12);
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert!((values[2] - 20.0).abs() < 1e-12);
        assert!(grid.is_edge(0) && grid.is_edge(2) && !grid.is_edge(1));
    }

    #[test]
    fn grid_rejects_degenerate_input() {
        assert!(BiasGrid::geometric(0.0, 10.0, 5).is_err());
        assert!(BiasGrid::geometric(f64::NAN, 10.0, 5).is_err());
        assert!(BiasGrid::geometric(1.0, 1.0, 5).is_err());
        assert!(BiasGrid::geometric(1.0, 10.0, 0).is_err());
        assert_eq!(BiasGrid::single(3.0).unwrap().values(), &[3.0]);
    }

    #[test]
    fn overlap_weights_follow_bennett_form() {
        let sample = ClusterSample {
            sampled: 1.0,
            perturbed: -2.0,
        };
        let w0 = overlap_weight(EnsembleRole::Reference, sample, 2.0);
        assert!((w0 - 0.5).abs() < 1e-12);
        let w1 = overlap_weight(EnsembleRole::Target, sample, 2.0);
        assert!((w1 - 0.4).abs() < 1e-12);
        let zero = ClusterSample {
            sampled: 0.0,
            perturbed: 0.0,
        };
        assert_eq!(overlap_weight(EnsembleRole::Target, zero, 1.0), 0.0);
    }

    #[test]
    fn block_errors_match_hand_computation() {
        let mut acc = BlockAccumulator::new(1, 2);
        for value in [1.0, 3.0, 2.0, 4.0, 6.0, 8.0] {
            acc.add(&[value]);
        }
        // block means: 2, 3, 7 -> mean 4, variance 14/3
        let stats = acc.statistics(0);
        assert_eq!(acc.block_count(), 3);
        assert!((stats.average - 4.0).abs() < 1e-12);
        let expected_error = ((14.0 / 3.0) / 2.0_f64).sqrt();
        assert!((stats.error - expected_error).abs() < 1e-12);
        // lag products: (2-4)(3-4) + (3-4)(7-4) = 2 - 3 = -1
        let expected_corr = -1.0 / (2.0 * 14.0 / 3.0);
        assert!((stats.block_correlation - expected_corr).abs() < 1e-12);
    }

    #[test]
    fn partial_blocks_do_not_feed_errors() {
        let mut acc = BlockAccumulator::new(1, 4);
        for value in [1.0, 2.0, 3.0] {
            acc.add(&[value]);
        }
        let stats = acc.statistics(0);
        assert_eq!(acc.block_count(), 0);
        assert!((stats.average - 2.0).abs() < 1e-12);
        assert!(stats.error.is_nan());
    }

    #[test]
    fn ratio_of_constant_streams_is_exact() {
        let grid = BiasGrid::single(1.0).unwrap();
        let mut acc = OverlapAccumulator::new(EnsembleRole::Reference, grid, 5);
        for _ in 0..50 {
            acc.add_sample(ClusterSample {
                sampled: 2.0,
                perturbed: 6.0,
            });
        }
        let data = acc.data(0).unwrap();
        assert!((data.average - 0.75).abs() < 1e-12);
        assert!((data.ratio - 0.75).abs() < 1e-12);
        assert_eq!(data.error, 0.0);
        assert_eq!(data.block_correlation, 0.0);
        assert!(acc.data(1).is_none());
    }

    #[test]
    fn resized_accumulator_matches_fresh_one() {
        let grid = BiasGrid::geometric(1.0, 4.0, 5).unwrap();
        let mut acc = OverlapAccumulator::new(EnsembleRole::Target, grid.clone(), 7);
        acc.add_sample(ClusterSample {
            sampled: 0.0,
            perturbed: 0.01,
        });
        acc.set_block_size(1);
        assert_eq!(acc, OverlapAccumulator::new(EnsembleRole::Target, grid, 1));
    }
}
