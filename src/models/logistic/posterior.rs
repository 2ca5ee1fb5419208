//! Posterior storage and summaries.

use super::types::RiskModelError;
use crate::utils::{percentile, sorted_copy, usize_to_f64};

/// A single posterior draw of the two model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosteriorDraw {
    /// Log-odds of injury at the centering workload.
    pub intercept: f64,
    /// Change in log-odds per workload unit.
    pub slope: f64,
}

/// Posterior draw collection in `(chain, iteration)` order.
///
/// Immutable once built; summarisers only borrow it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosteriorDraws {
    draws: Vec<PosteriorDraw>,
    chains: usize,
    draws_per_chain: usize,
}

impl PosteriorDraws {
    /// Concatenate per-chain draws in chain order.
    ///
    /// # Errors
    ///
    /// Returns `RiskModelError::InconsistentChains` if chain lengths differ.
    pub fn from_chains(chains: Vec<Vec<PosteriorDraw>>) -> Result<Self, RiskModelError> {
        let draws_per_chain = chains.first().map_or(0, Vec::len);
        if chains.iter().any(|chain| chain.len() != draws_per_chain) {
            return Err(RiskModelError::InconsistentChains);
        }
        let chain_count = chains.len();
        Ok(Self {
            draws: chains.into_iter().flatten().collect(),
            chains: chain_count,
            draws_per_chain,
        })
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.draws.len()
    }

    #[must_use]
    pub const fn chain_count(&self) -> usize {
        self.chains
    }

    #[must_use]
    pub const fn draws_per_chain(&self) -> usize {
        self.draws_per_chain
    }

    #[must_use]
    pub fn draws(&self) -> &[PosteriorDraw] {
        &self.draws
    }

    /// Draws of chain `index`, or an empty slice if out of range.
    #[must_use]
    pub fn chain(&self, index: usize) -> &[PosteriorDraw] {
        if index >= self.chains {
            return &[];
        }
        let start = index * self.draws_per_chain;
        &self.draws[start..start + self.draws_per_chain]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PosteriorDraw> {
        self.draws.iter()
    }

    #[must_use]
    pub fn intercepts(&self) -> Vec<f64> {
        self.draws.iter().map(|draw| draw.intercept).collect()
    }

    #[must_use]
    pub fn slopes(&self) -> Vec<f64> {
        self.draws.iter().map(|draw| draw.slope).collect()
    }
}

/// Scalar posterior summary statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParameterSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub q025: f64,
    pub q50: f64,
    pub q975: f64,
}

/// Posterior summary for both parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PosteriorSummary {
    pub intercept: ParameterSummary,
    pub slope: ParameterSummary,
    pub draw_count: usize,
}

/// Compute posterior summaries for both parameters.
#[must_use]
pub fn summarize_posterior(samples: &PosteriorDraws) -> PosteriorSummary {
    let draw_count = samples.len();
    if draw_count == 0 {
        return PosteriorSummary::default();
    }

    PosteriorSummary {
        intercept: summarize_scalar(&samples.intercepts()),
        slope: summarize_scalar(&samples.slopes()),
        draw_count,
    }
}

#[must_use]
pub(crate) fn summarize_scalar(values: &[f64]) -> ParameterSummary {
    if values.is_empty() {
        return ParameterSummary::default();
    }

    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>()
        / n.max(1.0);

    let sorted = sorted_copy(values);

    ParameterSummary {
        mean,
        std_dev: variance.sqrt(),
        q025: percentile(&sorted, 0.025),
        q50: percentile(&sorted, 0.5),
        q975: percentile(&sorted, 0.975),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(intercept: f64, slope: f64) -> PosteriorDraw {
        PosteriorDraw { intercept, slope }
    }

    #[test]
    fn summarize_empty_samples() {
        let summary = summarize_posterior(&PosteriorDraws::default());
        assert_eq!(summary.draw_count, 0);
        assert!((summary.slope.mean - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summarize_non_empty_samples() {
        let samples = PosteriorDraws::from_chains(vec![
            vec![draw(0.0, 1.0), draw(2.0, 3.0)],
            vec![draw(1.0, 2.0), draw(1.0, 2.0)],
        ])
        .expect("chains are consistent");

        let summary = summarize_posterior(&samples);
        assert_eq!(summary.draw_count, 4);
        assert!((summary.intercept.mean - 1.0).abs() < 1.0e-12);
        assert!((summary.slope.mean - 2.0).abs() < 1.0e-12);
        assert!(summary.slope.q025 <= summary.slope.q50);
        assert!(summary.slope.q50 <= summary.slope.q975);
    }

    #[test]
    fn chains_are_sliced_in_order() {
        let samples = PosteriorDraws::from_chains(vec![
            vec![draw(0.0, 0.0), draw(0.1, 0.0)],
            vec![draw(1.0, 0.0), draw(1.1, 0.0)],
        ])
        .expect("chains are consistent");
        assert_eq!(samples.chain_count(), 2);
        assert_eq!(samples.draws_per_chain(), 2);
        assert_eq!(samples.chain(1), &[draw(1.0, 0.0), draw(1.1, 0.0)]);
        assert!(samples.chain(2).is_empty());
    }

    #[test]
    fn unequal_chains_are_rejected() {
        let result =
            PosteriorDraws::from_chains(vec![vec![draw(0.0, 0.0)], vec![]]);
        assert_eq!(result, Err(RiskModelError::InconsistentChains));
    }
}
