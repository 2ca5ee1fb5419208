//! Posterior sampling backends and the model-fitting entry point.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::inference::{McmcConfig, TransitionStats};
use crate::input::Observation;
use crate::preprocess::{outcome_diagnostics, outcome_has_variation};
use crate::utils::{sample_standard_normal, usize_to_f64};

use super::adapt::{WindowedAdaptation, find_reasonable_step_size};
use super::diagnostics::summarize_convergence;
use super::laplace::posterior_mode;
use super::likelihood::LogPosterior;
use super::nuts::{PhasePoint, nuts_transition};
use super::posterior::{PosteriorDraw, PosteriorDraws, summarize_posterior};
use super::priors::PriorConfig;
use super::types::{
    FitReport, RiskModel, RiskModelError, SamplerDiagnostics, SamplerFailure, SamplerKind,
};

/// Draws and run diagnostics produced by one sampler call.
#[derive(Debug, Clone)]
pub struct SampledPosterior {
    pub draws: PosteriorDraws,
    pub diagnostics: SamplerDiagnostics,
}

/// Capability that turns observations and priors into posterior draws.
///
/// Implementations must fail with `InsufficientVariation` when every
/// observation shares one outcome, and with `SamplerDivergence` when their
/// draws cannot be trusted.
pub trait PosteriorSampler {
    /// Backend recorded in the fit diagnostics.
    fn kind(&self) -> SamplerKind;

    /// # Errors
    ///
    /// Returns `RiskModelError` if the configuration or data are invalid or
    /// the sampler fails.
    fn sample(
        &self,
        observations: &[Observation],
        prior: &PriorConfig,
    ) -> Result<SampledPosterior, RiskModelError>;
}

/// Multi-chain NUTS with windowed warm-up adaptation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NutsSampler {
    pub config: McmcConfig,
}

impl NutsSampler {
    #[must_use]
    pub const fn new(config: McmcConfig) -> Self {
        Self { config }
    }
}

struct ChainRun {
    draws: Vec<PosteriorDraw>,
    stats: TransitionStats,
    step_size: f64,
}

impl PosteriorSampler for NutsSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Nuts
    }

    fn sample(
        &self,
        observations: &[Observation],
        prior: &PriorConfig,
    ) -> Result<SampledPosterior, RiskModelError> {
        let config = self.config;
        config.validate()?;
        check_identifiable(observations)?;

        let log_posterior = LogPosterior::new(observations, *prior);
        let mode = posterior_mode(&log_posterior)?;
        let scales = mode.standard_deviations();
        let initial_inv_mass = [mode.covariance[(0, 0)], mode.covariance[(1, 1)]];
        let start = ChainStart {
            mode: mode.location,
            scales,
            inv_mass: initial_inv_mass,
        };

        let log_posterior_ref = &log_posterior;
        let mut chain_results = (0..config.chains)
            .map(|_| None)
            .collect::<Vec<Option<Result<ChainRun, RiskModelError>>>>();

        std::thread::scope(|scope| -> Result<(), RiskModelError> {
            let mut handles = Vec::with_capacity(config.chains);
            for chain_index in 0..config.chains {
                handles.push((
                    chain_index,
                    scope.spawn(move || run_chain(log_posterior_ref, start, config, chain_index)),
                ));
            }

            for (chain_index, handle) in handles {
                let result = handle.join().map_err(|_| SamplerFailure::ChainPanicked {
                    chain: chain_index,
                })?;
                chain_results[chain_index] = Some(result);
            }

            Ok(())
        })?;

        let mut transitions = TransitionStats::default();
        let mut step_sizes = Vec::with_capacity(config.chains);
        let mut chains = Vec::with_capacity(config.chains);
        for (chain_index, chain_result) in chain_results.into_iter().enumerate() {
            let run = chain_result.ok_or(SamplerFailure::ChainPanicked { chain: chain_index })??;
            transitions.merge(run.stats);
            step_sizes.push(run.step_size);
            chains.push(run.draws);
        }
        let draws = PosteriorDraws::from_chains(chains)?;

        if usize_to_f64(transitions.divergent)
            > config.max_divergence_fraction * usize_to_f64(transitions.transitions)
        {
            log::warn!(
                "{} of {} transitions diverged",
                transitions.divergent,
                transitions.transitions
            );
            return Err(SamplerFailure::ExcessiveDivergences {
                divergent: transitions.divergent,
                transitions: transitions.transitions,
            }
            .into());
        }

        let convergence = summarize_convergence(&draws)?;
        if !(convergence.max_split_rhat <= config.max_split_rhat) {
            return Err(SamplerFailure::PoorMixing {
                max_split_rhat: convergence.max_split_rhat,
                threshold: config.max_split_rhat,
            }
            .into());
        }

        log::info!(
            "nuts: {} chains x {} draws, {} divergent, mean accept {:.3}, max split-R-hat {:.4}",
            config.chains,
            config.draws,
            transitions.divergent,
            transitions.mean_accept_prob(),
            convergence.max_split_rhat
        );

        Ok(SampledPosterior {
            diagnostics: SamplerDiagnostics {
                backend: self.kind(),
                chains: draws.chain_count(),
                draws_per_chain: draws.draws_per_chain(),
                transitions,
                step_sizes,
                convergence: Some(convergence),
            },
            draws,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ChainStart {
    mode: [f64; 2],
    scales: [f64; 2],
    inv_mass: [f64; 2],
}

fn run_chain(
    log_posterior: &LogPosterior,
    start: ChainStart,
    config: McmcConfig,
    chain_index: usize,
) -> Result<ChainRun, RiskModelError> {
    let mut rng = StdRng::seed_from_u64(config.chain_seed(chain_index));

    let mut position = start.mode;
    for index in 0..2 {
        let offset = config.init_dispersion * start.scales[index] * sample_standard_normal(&mut rng);
        position[index] += offset;
    }
    let mut point = PhasePoint::at(log_posterior, position);
    if !point.log_density.is_finite() {
        return Err(SamplerFailure::NonFiniteDensity.into());
    }

    let initial_step = find_reasonable_step_size(log_posterior, &point, start.inv_mass);
    let mut adaptation =
        WindowedAdaptation::new(config.warmup, config.target_accept, initial_step, start.inv_mass);

    for iteration in 0..config.warmup {
        let transition = nuts_transition(
            log_posterior,
            &point,
            adaptation.step_size(),
            adaptation.inv_mass(),
            config.max_tree_depth,
            &mut rng,
        );
        point = transition.point;
        if adaptation.update(iteration, point.position, transition.accept_prob) {
            let step = find_reasonable_step_size(log_posterior, &point, adaptation.inv_mass());
            adaptation.restart_step_size(step);
        }
    }

    let step_size = adaptation.adapted_step_size();
    let inv_mass = adaptation.inv_mass();
    log::debug!(
        "chain {chain_index}: step size {step_size:.4}, inverse mass [{:.3e}, {:.3e}]",
        inv_mass[0],
        inv_mass[1]
    );

    let mut stats = TransitionStats::default();
    let mut draws = Vec::with_capacity(config.draws);
    for _ in 0..config.draws {
        let transition = nuts_transition(
            log_posterior,
            &point,
            step_size,
            inv_mass,
            config.max_tree_depth,
            &mut rng,
        );
        stats.record(transition.accept_prob, transition.depth, transition.divergent);
        point = transition.point;
        draws.push(PosteriorDraw {
            intercept: point.position[0],
            slope: point.position[1],
        });
    }

    Ok(ChainRun {
        draws,
        stats,
        step_size,
    })
}

/// Reject data that cannot identify both parameters.
pub(crate) fn check_identifiable(observations: &[Observation]) -> Result<(), RiskModelError> {
    let Some(first) = observations.first() else {
        return Err(RiskModelError::EmptyObservations);
    };
    if !outcome_has_variation(observations) {
        return Err(RiskModelError::InsufficientVariation {
            outcome: first.outcome,
            observations: observations.len(),
        });
    }
    Ok(())
}

/// Draw from the posterior with multi-chain NUTS.
///
/// # Errors
///
/// Returns `RiskModelError` if the data are degenerate or sampling fails.
pub fn sample_posterior(
    observations: &[Observation],
    prior: &PriorConfig,
    config: McmcConfig,
) -> Result<PosteriorDraws, RiskModelError> {
    NutsSampler::new(config)
        .sample(observations, prior)
        .map(|sampled| sampled.draws)
}

/// Fit the model with any sampler and summarise the result.
///
/// # Errors
///
/// Returns `RiskModelError` if the data are degenerate or sampling fails.
pub fn fit_risk_model<S>(
    observations: &[Observation],
    prior: &PriorConfig,
    sampler: &S,
) -> Result<(RiskModel, FitReport, PosteriorDraws), RiskModelError>
where
    S: PosteriorSampler + ?Sized,
{
    let mut sampled = sampler.sample(observations, prior)?;
    sampled.diagnostics.backend = sampler.kind();
    let diagnostics = outcome_diagnostics(observations);
    let model = RiskModel {
        n_observations: diagnostics.n_observations,
        n_events: diagnostics.n_events,
        distinct_workloads: diagnostics.distinct_workloads,
        centering_point: prior.centering_point(),
    };
    let posterior_summary = if sampled.draws.is_empty() {
        None
    } else {
        Some(summarize_posterior(&sampled.draws))
    };

    Ok((
        model,
        FitReport {
            diagnostics: sampled.diagnostics,
            posterior_summary,
        },
        sampled.draws,
    ))
}
