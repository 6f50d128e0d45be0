use mayer_core::{derive_substream_seed, EnsembleRole, RngHandle};

const COORDINATOR_SUBSTREAM: u64 = 2;

/// Derives the deterministic seed used by the sampler of `role`.
pub fn ensemble_seed(master_seed: u64, role: EnsembleRole) -> u64 {
    derive_substream_seed(master_seed, role.index() as u64)
}

/// Derives the seed of the coin that apportions macro steps.
pub fn coordinator_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, COORDINATOR_SUBSTREAM)
}

/// RNG handle for the sampler of `role`.
pub fn ensemble_rng(master_seed: u64, role: EnsembleRole) -> RngHandle {
    RngHandle::from_seed(ensemble_seed(master_seed, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_distinct() {
        let seeds = [
            ensemble_seed(9, EnsembleRole::Reference),
            ensemble_seed(9, EnsembleRole::Target),
            coordinator_seed(9),
        ];
        assert_ne!(seeds[0], seeds[1]);
        assert_ne!(seeds[1], seeds[2]);
        assert_ne!(seeds[0], seeds[2]);
        assert_eq!(seeds[2], derive_substream_seed(9, 2));
    }
}
