#![deny(missing_docs)]
#![doc = "Core capability traits, structured errors and deterministic RNG for the Mayer overlap-sampling engine."]

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod rng;

pub use errors::{ErrorInfo, MayerError};
pub use rng::{derive_substream_seed, RngHandle};

/// Evaluates the signed cluster value of a configuration.
///
/// Implementations must be pure: the same configuration and temperature
/// always produce the same value and evaluation never mutates shared state.
/// A value of exactly `0.0` marks an excluded (overlapping) configuration.
pub trait Integrand<C>: Send + Sync {
    /// Returns the cluster value of `configuration` at `temperature`.
    fn value(&self, configuration: &C, temperature: f64) -> f64;

    /// Short label used in logs and manifests.
    fn name(&self) -> &str {
        "integrand"
    }
}

/// Adapts a closure into an [`Integrand`].
pub struct FnIntegrand<F> {
    name: String,
    func: F,
}

impl<F> FnIntegrand<F> {
    /// Wraps `func` under the provided label.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<C, F> Integrand<C> for FnIntegrand<F>
where
    F: Fn(&C, f64) -> f64 + Send + Sync,
{
    fn value(&self, configuration: &C, temperature: f64) -> f64 {
        (self.func)(configuration, temperature)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> std::fmt::Debug for FnIntegrand<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnIntegrand")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Result of a trial move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Ratio of reverse to forward proposal densities. The sampler multiplies
    /// it by the ratio of sampling weights to obtain the acceptance ratio.
    pub a_priori_ratio: f64,
}

impl Proposal {
    /// Proposal drawn from a symmetric distribution.
    pub fn symmetric() -> Self {
        Self {
            a_priori_ratio: 1.0,
        }
    }
}

/// One Monte Carlo trial-move kind acting on configurations of type `C`.
///
/// `propose` mutates the configuration into the trial state. Exactly one of
/// `notify_accepted` or `notify_rejected` follows; the latter must restore
/// the configuration that existed before `propose`.
pub trait MoveProposer<C>: Send {
    /// Stable label for acceptance bookkeeping.
    fn name(&self) -> &str;

    /// Moves `configuration` into a trial state.
    fn propose(
        &mut self,
        configuration: &mut C,
        rng: &mut RngHandle,
    ) -> Result<Proposal, MayerError>;

    /// Commits the trial state.
    fn notify_accepted(&mut self, configuration: &mut C);

    /// Restores the state that preceded the last proposal.
    fn notify_rejected(&mut self, configuration: &mut C);

    /// Feeds one trial outcome to the step-size adaptation, if any. Only
    /// called while the owning ensemble is equilibrating.
    fn tune(&mut self, _accepted: bool) {}

    /// Current step size for diagnostics.
    fn step_size(&self) -> Option<f64> {
        None
    }
}

/// Both integrand values evaluated on one configuration of an ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterSample {
    /// Value of the ensemble's own integrand; its magnitude is the sampling weight.
    pub sampled: f64,
    /// Value of the other ensemble's integrand on the same configuration.
    pub perturbed: f64,
}

/// Index of an ensemble inside an overlap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnsembleRole {
    /// Reference system with the analytically known integral (index 0).
    Reference,
    /// Target system whose integral is estimated (index 1).
    Target,
}

impl EnsembleRole {
    /// Both roles in index order.
    pub const ALL: [EnsembleRole; 2] = [EnsembleRole::Reference, EnsembleRole::Target];

    /// Returns the array index of the role.
    pub fn index(self) -> usize {
        match self {
            EnsembleRole::Reference => 0,
            EnsembleRole::Target => 1,
        }
    }

    /// The role of the opposite ensemble.
    pub fn other(self) -> EnsembleRole {
        match self {
            EnsembleRole::Reference => EnsembleRole::Target,
            EnsembleRole::Target => EnsembleRole::Reference,
        }
    }

    /// Returns a lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            EnsembleRole::Reference => "reference",
            EnsembleRole::Target => "target",
        }
    }
}
