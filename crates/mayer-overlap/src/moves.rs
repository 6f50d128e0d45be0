use indexmap::IndexMap;
use mayer_core::errors::ErrorInfo;
use mayer_core::{MayerError, MoveProposer, Proposal, RngHandle};
use serde::{Deserialize, Serialize};

/// Accept/propose counters for one move kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStats {
    /// Trials proposed.
    pub proposed: u64,
    /// Trials accepted.
    pub accepted: u64,
}

impl MoveStats {
    /// Fraction of accepted trials, zero before the first trial.
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

struct MoveEntry<C> {
    proposer: Box<dyn MoveProposer<C>>,
    weight: f64,
    stats: MoveStats,
}

/// Weighted collection of move kinds owned by one ensemble.
pub struct MoveSet<C> {
    entries: Vec<MoveEntry<C>>,
    total_weight: f64,
}

impl<C> Default for MoveSet<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            total_weight: 0.0,
        }
    }
}

impl<C> std::fmt::Debug for MoveSet<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.proposer.name()))
            .finish()
    }
}

impl<C> MoveSet<C> {
    /// Creates an empty move set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a proposer with the given selection weight.
    pub fn with(mut self, proposer: impl MoveProposer<C> + 'static, weight: f64) -> Self {
        self.push(Box::new(proposer), weight);
        self
    }

    /// Adds a boxed proposer; non-positive weights are ignored.
    pub fn push(&mut self, proposer: Box<dyn MoveProposer<C>>, weight: f64) {
        if !(weight.is_finite() && weight > 0.0) {
            return;
        }
        self.total_weight += weight;
        self.entries.push(MoveEntry {
            proposer,
            weight,
            stats: MoveStats::default(),
        });
    }

    /// Number of move kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no move kind is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Picks a move kind by weight.
    pub fn pick(&self, rng: &mut RngHandle) -> Result<usize, MayerError> {
        if self.entries.is_empty() {
            return Err(MayerError::Move(ErrorInfo::new(
                "empty-move-set",
                "ensemble has no move proposers",
            )));
        }
        let mut draw = rng.uniform() * self.total_weight;
        for (idx, entry) in self.entries.iter().enumerate() {
            if draw < entry.weight {
                return Ok(idx);
            }
            draw -= entry.weight;
        }
        Ok(self.entries.len() - 1)
    }

    pub(crate) fn proposer_mut(&mut self, index: usize) -> &mut dyn MoveProposer<C> {
        self.entries[index].proposer.as_mut()
    }

    pub(crate) fn record(&mut self, index: usize, accepted: bool, tuning: bool) {
        let entry = &mut self.entries[index];
        entry.stats.proposed += 1;
        if accepted {
            entry.stats.accepted += 1;
        }
        if tuning {
            entry.proposer.tune(accepted);
        }
    }

    /// Report keys in registration order: the proposer name, suffixed with
    /// `#2`, `#3`, ... when the same name was registered before.
    pub fn keys(&self) -> Vec<String> {
        let mut seen: IndexMap<&str, usize> = IndexMap::new();
        self.entries
            .iter()
            .map(|entry| {
                let name = entry.proposer.name();
                let count = seen.entry(name).or_insert(0);
                *count += 1;
                if *count == 1 {
                    name.to_string()
                } else {
                    format!("{name}#{count}")
                }
            })
            .collect()
    }

    /// Acceptance rate per move, keyed by [`MoveSet::keys`].
    pub fn acceptance_rates(&self) -> IndexMap<String, f64> {
        self.keys()
            .into_iter()
            .zip(&self.entries)
            .map(|(key, entry)| (key, entry.stats.acceptance_rate()))
            .collect()
    }

    /// Raw counters per move, keyed by [`MoveSet::keys`].
    pub fn stats(&self) -> IndexMap<String, MoveStats> {
        self.keys()
            .into_iter()
            .zip(&self.entries)
            .map(|(key, entry)| (key, entry.stats))
            .collect()
    }

    /// Current step sizes of moves that expose one.
    pub fn step_sizes(&self) -> IndexMap<String, f64> {
        self.keys()
            .into_iter()
            .zip(&self.entries)
            .filter_map(|(key, entry)| entry.proposer.step_size().map(|step| (key, step)))
            .collect()
    }
}

/// Multiplicative step-size adaptation toward a target acceptance rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTracker {
    step: f64,
    min_step: f64,
    max_step: f64,
    target_acceptance: f64,
    adjust_interval: u32,
    adjust_factor: f64,
    trials: u32,
    accepted: u32,
}

impl StepTracker {
    /// Tracker starting at `step`, bounded to `[min_step, max_step]`.
    pub fn new(step: f64, min_step: f64, max_step: f64) -> Self {
        Self {
            step: step.clamp(min_step, max_step),
            min_step,
            max_step,
            target_acceptance: 0.5,
            adjust_interval: 100,
            adjust_factor: 1.05,
            trials: 0,
            accepted: 0,
        }
    }

    /// Overrides the acceptance target (default 0.5).
    pub fn with_target(mut self, target_acceptance: f64) -> Self {
        self.target_acceptance = target_acceptance;
        self
    }

    /// Overrides the number of trials between adjustments (default 100).
    pub fn with_interval(mut self, adjust_interval: u32) -> Self {
        self.adjust_interval = adjust_interval.max(1);
        self
    }

    /// Current step size.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Records one trial and adjusts the step when the interval is complete.
    pub fn record(&mut self, accepted: bool) {
        self.trials += 1;
        if accepted {
            self.accepted += 1;
        }
        if self.trials < self.adjust_interval {
            return;
        }
        let rate = f64::from(self.accepted) / f64::from(self.trials);
        if rate > self.target_acceptance {
            self.step *= self.adjust_factor;
        } else {
            self.step /= self.adjust_factor;
        }
        self.step = self.step.clamp(self.min_step, self.max_step);
        self.trials = 0;
        self.accepted = 0;
    }
}

/// Displaces every coordinate by an independent uniform amount in
/// `[-step, step]`.
#[derive(Debug, Clone)]
pub struct Translation {
    tracker: StepTracker,
    previous: Vec<f64>,
}

impl Translation {
    /// Translation with an initial step size bounded to `[1e-6, max_step]`.
    pub fn new(step: f64, max_step: f64) -> Self {
        Self::with_tracker(StepTracker::new(step, 1e-6, max_step))
    }

    /// Translation driven by an explicit tracker.
    pub fn with_tracker(tracker: StepTracker) -> Self {
        Self {
            tracker,
            previous: Vec::new(),
        }
    }
}

impl MoveProposer<Vec<f64>> for Translation {
    fn name(&self) -> &str {
        "translation"
    }

    fn propose(
        &mut self,
        configuration: &mut Vec<f64>,
        rng: &mut RngHandle,
    ) -> Result<Proposal, MayerError> {
        self.previous.clone_from(configuration);
        let step = self.tracker.step();
        for coordinate in configuration.iter_mut() {
            *coordinate += step * rng.symmetric();
        }
        Ok(Proposal::symmetric())
    }

    fn notify_accepted(&mut self, _configuration: &mut Vec<f64>) {}

    fn notify_rejected(&mut self, configuration: &mut Vec<f64>) {
        configuration.clone_from(&self.previous);
    }

    fn tune(&mut self, accepted: bool) {
        self.tracker.record(accepted);
    }

    fn step_size(&self) -> Option<f64> {
        Some(self.tracker.step())
    }
}
