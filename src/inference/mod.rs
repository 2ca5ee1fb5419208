//! Reusable inference and MCMC utility types.

use thiserror::Error;

use crate::utils::usize_to_f64;

/// Errors for generic MCMC configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum InferenceError {
    #[error("at least {min} chains are required; found {found}")]
    InvalidChainCount { min: usize, found: usize },
    #[error("warm-up iterations must be positive")]
    InvalidWarmup,
    #[error("retained draws per chain must be at least {min}; found {found}")]
    InvalidDraws { min: usize, found: usize },
    #[error("target acceptance must lie strictly between 0 and 1; found {0}")]
    InvalidTargetAccept(f64),
    #[error("maximum tree depth must lie in 1..=15; found {0}")]
    InvalidTreeDepth(usize),
    #[error("chain seed stride must be positive")]
    InvalidSeedStride,
    #[error("initial dispersion must be finite and non-negative; found {0}")]
    InvalidDispersion(f64),
    #[error("divergence fraction threshold must lie in [0, 1]; found {0}")]
    InvalidDivergenceThreshold(f64),
    #[error("split-R-hat threshold must be at least 1; found {0}")]
    InvalidRhatThreshold(f64),
}

/// Multi-chain NUTS schedule and acceptance criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McmcConfig {
    /// Number of independent chains.
    pub chains: usize,
    /// Warm-up (adaptation) iterations per chain, discarded.
    pub warmup: usize,
    /// Retained post-warm-up iterations per chain.
    pub draws: usize,
    /// Base RNG seed.
    pub seed: u64,
    /// Chain `i` uses `seed + i * seed_stride` with wrapping arithmetic.
    pub seed_stride: u64,
    /// Dual-averaging target for the mean acceptance statistic.
    pub target_accept: f64,
    /// Maximum NUTS tree depth (at most `2^depth` leapfrog steps per transition).
    pub max_tree_depth: usize,
    /// Starting points are `mode + init_dispersion * sd * z`, `z ~ N(0, I)`.
    pub init_dispersion: f64,
    /// Fit fails if more than this fraction of retained transitions diverge.
    pub max_divergence_fraction: f64,
    /// Fit fails if any parameter's split-R-hat exceeds this value.
    pub max_split_rhat: f64,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            chains: 2,
            warmup: 1_000,
            draws: 1_000,
            seed: 42,
            seed_stride: 10_000,
            target_accept: 0.8,
            max_tree_depth: 10,
            init_dispersion: 2.0,
            max_divergence_fraction: 0.05,
            max_split_rhat: 1.1,
        }
    }
}

impl McmcConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if schedule values are invalid.
    pub fn validate(self) -> Result<(), InferenceError> {
        if self.chains < 2 {
            return Err(InferenceError::InvalidChainCount {
                min: 2,
                found: self.chains,
            });
        }
        if self.warmup == 0 {
            return Err(InferenceError::InvalidWarmup);
        }
        if self.draws < 4 {
            return Err(InferenceError::InvalidDraws {
                min: 4,
                found: self.draws,
            });
        }
        if !(self.target_accept > 0.0 && self.target_accept < 1.0) {
            return Err(InferenceError::InvalidTargetAccept(self.target_accept));
        }
        if !(1..=15).contains(&self.max_tree_depth) {
            return Err(InferenceError::InvalidTreeDepth(self.max_tree_depth));
        }
        if self.seed_stride == 0 {
            return Err(InferenceError::InvalidSeedStride);
        }
        if !(self.init_dispersion.is_finite() && self.init_dispersion >= 0.0) {
            return Err(InferenceError::InvalidDispersion(self.init_dispersion));
        }
        if !(0.0..=1.0).contains(&self.max_divergence_fraction) {
            return Err(InferenceError::InvalidDivergenceThreshold(
                self.max_divergence_fraction,
            ));
        }
        if !(self.max_split_rhat >= 1.0) {
            return Err(InferenceError::InvalidRhatThreshold(self.max_split_rhat));
        }
        Ok(())
    }

    /// Number of retained draws across all chains.
    #[must_use]
    pub const fn total_draws(self) -> usize {
        self.chains * self.draws
    }

    /// Seed used by chain `chain_index`.
    #[must_use]
    pub fn chain_seed(self, chain_index: usize) -> u64 {
        let index_u64 = u64::try_from(chain_index).unwrap_or(u64::MAX);
        self.seed
            .wrapping_add(index_u64.wrapping_mul(self.seed_stride))
    }
}

/// Running statistics over NUTS transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionStats {
    pub transitions: usize,
    pub divergent: usize,
    pub accept_prob_sum: f64,
    pub tree_depth_sum: usize,
}

impl TransitionStats {
    /// Record one transition.
    pub fn record(&mut self, accept_prob: f64, tree_depth: usize, divergent: bool) {
        self.transitions += 1;
        self.divergent += usize::from(divergent);
        self.accept_prob_sum += accept_prob;
        self.tree_depth_sum += tree_depth;
    }

    /// Combine counters from another chain.
    pub fn merge(&mut self, other: Self) {
        self.transitions += other.transitions;
        self.divergent += other.divergent;
        self.accept_prob_sum += other.accept_prob_sum;
        self.tree_depth_sum += other.tree_depth_sum;
    }

    /// Mean acceptance statistic in `[0, 1]`, or `0` if nothing was recorded.
    #[must_use]
    pub fn mean_accept_prob(self) -> f64 {
        ratio(self.accept_prob_sum, self.transitions)
    }

    /// Fraction of divergent transitions, or `0` if nothing was recorded.
    #[must_use]
    pub fn divergence_rate(self) -> f64 {
        ratio(usize_to_f64(self.divergent), self.transitions)
    }

    #[must_use]
    pub fn mean_tree_depth(self) -> f64 {
        ratio(usize_to_f64(self.tree_depth_sum), self.transitions)
    }
}

fn ratio(numerator: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / usize_to_f64(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = McmcConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_draws(), 2_000);
    }

    #[test]
    fn config_validation_rejects_single_chain() {
        let config = McmcConfig {
            chains: 1,
            ..McmcConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(InferenceError::InvalidChainCount { min: 2, found: 1 })
        );
    }

    #[test]
    fn config_validation_rejects_boundary_target_accept() {
        let config = McmcConfig {
            target_accept: 1.0,
            ..McmcConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(InferenceError::InvalidTargetAccept(1.0))
        );
    }

    #[test]
    fn chain_seeds_follow_stride() {
        let config = McmcConfig {
            seed: 7,
            seed_stride: 100,
            ..McmcConfig::default()
        };
        assert_eq!(config.chain_seed(0), 7);
        assert_eq!(config.chain_seed(3), 307);
    }

    #[test]
    fn transition_stats_tracks_rates() {
        let mut stats = TransitionStats::default();
        stats.record(1.0, 2, false);
        stats.record(0.5, 4, true);
        assert!((stats.mean_accept_prob() - 0.75).abs() < 1.0e-12);
        assert!((stats.divergence_rate() - 0.5).abs() < 1.0e-12);
        assert!((stats.mean_tree_depth() - 3.0).abs() < 1.0e-12);

        let mut pooled = TransitionStats::default();
        pooled.merge(stats);
        pooled.merge(stats);
        assert_eq!(pooled.transitions, 4);
        assert_eq!(pooled.divergent, 2);
    }
}
