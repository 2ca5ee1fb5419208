//! MCMC convergence diagnostics.

use crate::inference::InferenceError;
use crate::utils::usize_to_f64;

use super::posterior::{PosteriorDraw, PosteriorDraws};
use super::types::{ConvergenceSummary, RiskModelError};

/// Lag-`k` autocorrelation for a scalar chain.
#[must_use]
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    if series.is_empty() || lag >= series.len() {
        return 0.0;
    }

    let n = series.len() - lag;
    let mean = series.iter().sum::<f64>() / usize_to_f64(series.len());

    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for value in series {
        let centered = value - mean;
        denominator += centered * centered;
    }

    if denominator <= 0.0 {
        return 0.0;
    }

    for idx in 0..n {
        numerator += (series[idx] - mean) * (series[idx + lag] - mean);
    }

    numerator / denominator
}

/// Heuristic effective sample size using positive autocorrelation truncation.
#[must_use]
pub fn effective_sample_size(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return usize_to_f64(n);
    }

    let mut rho_sum = 0.0;
    for lag in 1..n {
        let rho = autocorrelation(series, lag);
        if rho <= 0.0 {
            break;
        }
        rho_sum += rho;
    }

    usize_to_f64(n) / (2.0f64.mul_add(rho_sum, 1.0)).max(1.0)
}

/// Summarize split-R-hat and ESS across the chains of a draw collection.
///
/// All chains hold the same number of draws; the last draw is dropped when
/// that number is odd so each chain splits into equal halves.
///
/// # Errors
///
/// Returns `RiskModelError` if there are fewer than two chains or four draws per chain.
pub fn summarize_convergence(draws: &PosteriorDraws) -> Result<ConvergenceSummary, RiskModelError> {
    if draws.chain_count() < 2 {
        return Err(InferenceError::InvalidChainCount {
            min: 2,
            found: draws.chain_count(),
        }
        .into());
    }

    let per_chain = draws.draws_per_chain();
    let draws_per_chain_used = per_chain - (per_chain % 2);
    if draws_per_chain_used < 4 {
        return Err(InferenceError::InvalidDraws {
            min: 4,
            found: draws_per_chain_used,
        }
        .into());
    }

    let intercept_split_rhat =
        split_rhat_from_chains(draws, draws_per_chain_used, |draw| draw.intercept);
    let slope_split_rhat = split_rhat_from_chains(draws, draws_per_chain_used, |draw| draw.slope);

    Ok(ConvergenceSummary {
        chain_count: draws.chain_count(),
        draws_per_chain_used,
        intercept_split_rhat,
        slope_split_rhat,
        max_split_rhat: intercept_split_rhat.max(slope_split_rhat),
        intercept_ess: pooled_ess(draws, |draw| draw.intercept),
        slope_ess: pooled_ess(draws, |draw| draw.slope),
    })
}

fn pooled_ess<F>(draws: &PosteriorDraws, extractor: F) -> f64
where
    F: Fn(&PosteriorDraw) -> f64,
{
    (0..draws.chain_count())
        .map(|index| {
            let series = draws.chain(index).iter().map(&extractor).collect::<Vec<_>>();
            effective_sample_size(&series)
        })
        .sum()
}

fn split_rhat_from_chains<F>(draws: &PosteriorDraws, draws_per_chain_used: usize, extractor: F) -> f64
where
    F: Fn(&PosteriorDraw) -> f64,
{
    let half = draws_per_chain_used / 2;
    let mut split_chains = Vec::with_capacity(draws.chain_count() * 2);

    for index in 0..draws.chain_count() {
        let chain = draws.chain(index);
        split_chains.push(chain.iter().take(half).map(&extractor).collect::<Vec<_>>());
        split_chains.push(
            chain
                .iter()
                .skip(half)
                .take(half)
                .map(&extractor)
                .collect::<Vec<_>>(),
        );
    }

    split_rhat_scalar(&split_chains)
}

fn split_rhat_scalar(chains: &[Vec<f64>]) -> f64 {
    let n = chains.first().map_or(0, Vec::len);
    let m = chains.len();
    if m < 2 || n < 2 {
        return f64::NAN;
    }

    let chain_means = chains
        .iter()
        .map(|chain| chain.iter().sum::<f64>() / usize_to_f64(n))
        .collect::<Vec<_>>();
    let chain_vars = chains
        .iter()
        .zip(chain_means.iter())
        .map(|(chain, mean)| sample_variance(chain, *mean))
        .collect::<Vec<_>>();

    let mean_of_means = chain_means.iter().sum::<f64>() / usize_to_f64(m);
    let between = usize_to_f64(n)
        * chain_means
            .iter()
            .map(|mean| {
                let centered = *mean - mean_of_means;
                centered * centered
            })
            .sum::<f64>()
        / usize_to_f64(m - 1);
    let within = chain_vars.iter().sum::<f64>() / usize_to_f64(m);

    if !(within.is_finite() && within > 0.0 && between.is_finite()) {
        return 1.0;
    }

    let n_f64 = usize_to_f64(n);
    let var_plus = ((n_f64 - 1.0) / n_f64).mul_add(within, between / n_f64);
    if !var_plus.is_finite() || var_plus <= 0.0 {
        return 1.0;
    }

    (var_plus / within).sqrt().max(1.0)
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values
        .iter()
        .map(|value| {
            let centered = *value - mean;
            centered * centered
        })
        .sum::<f64>()
        / usize_to_f64(values.len() - 1)
}
