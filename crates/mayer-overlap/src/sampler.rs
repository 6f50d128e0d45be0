use std::sync::Arc;

use mayer_core::errors::ErrorInfo;
use mayer_core::{ClusterSample, EnsembleRole, Integrand, MayerError, RngHandle};
use tracing::debug;

use crate::moves::MoveSet;

/// Everything one ensemble needs before sampling starts.
pub struct Ensemble<C> {
    /// Starting configuration, owned exclusively by the ensemble.
    pub configuration: C,
    /// Integrand whose magnitude is the sampling weight of this ensemble.
    pub sampled: Arc<dyn Integrand<C>>,
    /// The other ensemble's integrand, evaluated on this ensemble's configurations.
    pub perturbed: Arc<dyn Integrand<C>>,
    /// Trial moves acting on the configuration.
    pub moves: MoveSet<C>,
    /// Temperature forwarded to both integrands.
    pub temperature: f64,
}

impl<C> Ensemble<C> {
    /// Ensemble at unit temperature.
    pub fn new(
        configuration: C,
        sampled: Arc<dyn Integrand<C>>,
        perturbed: Arc<dyn Integrand<C>>,
        moves: MoveSet<C>,
    ) -> Self {
        Self {
            configuration,
            sampled,
            perturbed,
            moves,
            temperature: 1.0,
        }
    }

    /// Overrides the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Metropolis chain over one ensemble.
pub struct EnsembleSampler<C> {
    role: EnsembleRole,
    configuration: C,
    sampled: Arc<dyn Integrand<C>>,
    perturbed: Arc<dyn Integrand<C>>,
    moves: MoveSet<C>,
    temperature: f64,
    rng: RngHandle,
    current: ClusterSample,
    steps: u64,
    accepted: u64,
}

impl<C> EnsembleSampler<C> {
    /// Wraps an ensemble; call [`Self::initialize`] before stepping.
    pub fn new(role: EnsembleRole, ensemble: Ensemble<C>, rng: RngHandle) -> Self {
        let current = ClusterSample {
            sampled: ensemble
                .sampled
                .value(&ensemble.configuration, ensemble.temperature),
            perturbed: ensemble
                .perturbed
                .value(&ensemble.configuration, ensemble.temperature),
        };
        Self {
            role,
            configuration: ensemble.configuration,
            sampled: ensemble.sampled,
            perturbed: ensemble.perturbed,
            moves: ensemble.moves,
            temperature: ensemble.temperature,
            rng,
            current,
            steps: 0,
            accepted: 0,
        }
    }

    /// Walks away from a zero-weight start.
    ///
    /// Trial moves are accepted unconditionally until the sampled integrand is
    /// nonzero. Returns the number of moves needed; fails once
    /// `max_attempts` moves all landed on zero weight.
    pub fn initialize(&mut self, max_attempts: usize) -> Result<usize, MayerError> {
        if has_weight(self.current.sampled) {
            return Ok(0);
        }
        for attempt in 1..=max_attempts {
            let index = self.moves.pick(&mut self.rng)?;
            let proposer = self.moves.proposer_mut(index);
            proposer.propose(&mut self.configuration, &mut self.rng)?;
            proposer.notify_accepted(&mut self.configuration);
            self.current = self.evaluate();
            if has_weight(self.current.sampled) {
                debug!(
                    role = self.role.as_str(),
                    attempt, "found nonzero starting configuration"
                );
                return Ok(attempt);
            }
        }
        Err(MayerError::Initialization(
            ErrorInfo::new(
                "zero-weight-start",
                "could not find a configuration for target system",
            )
            .with_context("role", self.role.as_str())
            .with_context("attempts", max_attempts.to_string())
            .with_hint("start from a configuration where the integrand is nonzero"),
        ))
    }

    fn evaluate(&self) -> ClusterSample {
        ClusterSample {
            sampled: self.sampled.value(&self.configuration, self.temperature),
            perturbed: self.perturbed.value(&self.configuration, self.temperature),
        }
    }

    /// Performs one Metropolis step and returns the sample of the resulting
    /// state. `tuning` forwards the outcome to the proposer's step adaptation.
    pub fn step(&mut self, tuning: bool) -> Result<ClusterSample, MayerError> {
        let index = self.moves.pick(&mut self.rng)?;
        let proposal = self
            .moves
            .proposer_mut(index)
            .propose(&mut self.configuration, &mut self.rng)?;
        let trial = self.sampled.value(&self.configuration, self.temperature);
        let chi = if trial.is_finite() {
            proposal.a_priori_ratio * trial.abs() / self.current.sampled.abs()
        } else {
            0.0
        };
        let accepted = chi >= 1.0 || (chi > 0.0 && self.rng.uniform() < chi);
        let proposer = self.moves.proposer_mut(index);
        if accepted {
            proposer.notify_accepted(&mut self.configuration);
            self.current = ClusterSample {
                sampled: trial,
                perturbed: self.perturbed.value(&self.configuration, self.temperature),
            };
            self.accepted += 1;
        } else {
            proposer.notify_rejected(&mut self.configuration);
        }
        self.moves.record(index, accepted, tuning);
        self.steps += 1;
        Ok(self.current)
    }

    /// Role of this ensemble.
    pub fn role(&self) -> EnsembleRole {
        self.role
    }

    /// Sample of the current state.
    pub fn current(&self) -> ClusterSample {
        self.current
    }

    /// Current configuration.
    pub fn configuration(&self) -> &C {
        &self.configuration
    }

    /// Temperature forwarded to the integrands.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Steps performed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Overall acceptance rate across move kinds.
    pub fn acceptance_rate(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.accepted as f64 / self.steps as f64
        }
    }

    /// Move set with its per-kind statistics.
    pub fn moves(&self) -> &MoveSet<C> {
        &self.moves
    }
}

fn has_weight(value: f64) -> bool {
    value.is_finite() && value != 0.0
}
