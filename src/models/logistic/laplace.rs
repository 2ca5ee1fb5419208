//! Posterior mode search and the Gaussian (Laplace) approximation around it.

use faer::Mat;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::inference::McmcConfig;
use crate::input::Observation;
use crate::utils::{
    cholesky_lower, identity_matrix, max_abs_diff, sample_standard_normal, solve_linear_system,
};

use super::diagnostics::summarize_convergence;
use super::likelihood::LogPosterior;
use super::posterior::{PosteriorDraw, PosteriorDraws};
use super::priors::PriorConfig;
use super::sampler::{PosteriorSampler, SampledPosterior, check_identifiable};
use super::types::{RiskModelError, SamplerDiagnostics, SamplerFailure, SamplerKind};

const MAX_NEWTON_ITERATIONS: usize = 100;
const NEWTON_TOLERANCE: f64 = 1e-10;
const MIN_STEP_FRACTION: f64 = 1e-8;

/// Maximum a posteriori estimate with its Laplace covariance.
#[derive(Debug, Clone)]
pub struct PosteriorMode {
    /// `[intercept, slope]` at the mode.
    pub location: [f64; 2],
    /// Inverse of the negative Hessian at the mode.
    pub covariance: Mat<f64>,
    /// Newton iterations taken.
    pub iterations: usize,
}

impl PosteriorMode {
    /// Marginal posterior standard deviations `[intercept, slope]`.
    #[must_use]
    pub fn standard_deviations(&self) -> [f64; 2] {
        [
            self.covariance[(0, 0)].sqrt(),
            self.covariance[(1, 1)].sqrt(),
        ]
    }
}

/// Locate the posterior mode by damped Newton ascent, starting from the prior
/// location with a flat slope.
///
/// # Errors
///
/// Returns `SamplerDivergence` if the density is not finite at the start,
/// the iteration fails to converge, or the curvature at the mode is not
/// negative definite.
pub fn posterior_mode(log_posterior: &LogPosterior) -> Result<PosteriorMode, RiskModelError> {
    let prior = log_posterior.prior();
    let mut theta = [prior.intercept_prior_location(), prior.slope_prior_location()];
    let mut current = log_posterior.log_density(theta);
    if !current.is_finite() {
        return Err(SamplerFailure::NonFiniteDensity.into());
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < MAX_NEWTON_ITERATIONS {
        iterations += 1;
        let grad = log_posterior.gradient(theta);
        let information = log_posterior.negative_hessian(theta);
        let rhs = Mat::from_fn(2, 1, |row, _| grad[row]);
        let step = solve_linear_system(&information, &rhs)?;

        let mut fraction = 1.0;
        let mut candidate = theta;
        let mut candidate_density = f64::NEG_INFINITY;
        while fraction >= MIN_STEP_FRACTION {
            candidate = [
                fraction.mul_add(step[(0, 0)], theta[0]),
                fraction.mul_add(step[(1, 0)], theta[1]),
            ];
            candidate_density = log_posterior.log_density(candidate);
            if candidate_density.is_finite() && candidate_density >= current - 1e-12 {
                break;
            }
            fraction *= 0.5;
        }
        if fraction < MIN_STEP_FRACTION {
            return Err(SamplerFailure::ModeNotFound.into());
        }

        let previous = Mat::from_fn(2, 1, |row, _| theta[row]);
        let next = Mat::from_fn(2, 1, |row, _| candidate[row]);
        let change = max_abs_diff(&next, &previous);
        theta = candidate;
        current = candidate_density;
        if change < NEWTON_TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(SamplerFailure::ModeNotFound.into());
    }

    let information = log_posterior.negative_hessian(theta);
    if cholesky_lower(&information).is_none() {
        return Err(SamplerFailure::IndefiniteCurvature.into());
    }
    let covariance = solve_linear_system(&information, &identity_matrix(2))?;

    Ok(PosteriorMode {
        location: theta,
        covariance,
        iterations,
    })
}

/// Independent draws from `N(mode, covariance)` in the same chain layout as NUTS.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaplaceSampler {
    /// Only `chains`, `draws`, `seed` and `seed_stride` are used.
    pub config: McmcConfig,
}

impl LaplaceSampler {
    #[must_use]
    pub const fn new(config: McmcConfig) -> Self {
        Self { config }
    }
}

impl PosteriorSampler for LaplaceSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Laplace
    }

    fn sample(
        &self,
        observations: &[Observation],
        prior: &PriorConfig,
    ) -> Result<SampledPosterior, RiskModelError> {
        self.config.validate()?;
        check_identifiable(observations)?;

        let log_posterior = LogPosterior::new(observations, *prior);
        let mode = posterior_mode(&log_posterior)?;
        let lower = cholesky_lower(&mode.covariance).ok_or(SamplerFailure::IndefiniteCurvature)?;

        let chains = (0..self.config.chains)
            .map(|chain_index| {
                let mut rng = StdRng::seed_from_u64(self.config.chain_seed(chain_index));
                (0..self.config.draws)
                    .map(|_| {
                        let z0 = sample_standard_normal(&mut rng);
                        let z1 = sample_standard_normal(&mut rng);
                        let slope_shift = lower[(1, 1)].mul_add(z1, mode.location[1]);
                        PosteriorDraw {
                            intercept: lower[(0, 0)].mul_add(z0, mode.location[0]),
                            slope: lower[(1, 0)].mul_add(z0, slope_shift),
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let draws = PosteriorDraws::from_chains(chains)?;

        log::info!(
            "laplace approximation: mode ({:.4}, {:.4}) after {} Newton steps, {} draws",
            mode.location[0],
            mode.location[1],
            mode.iterations,
            draws.len()
        );

        Ok(SampledPosterior {
            diagnostics: SamplerDiagnostics {
                backend: self.kind(),
                chains: draws.chain_count(),
                draws_per_chain: draws.draws_per_chain(),
                convergence: summarize_convergence(&draws).ok(),
                ..SamplerDiagnostics::default()
            },
            draws,
        })
    }
}
