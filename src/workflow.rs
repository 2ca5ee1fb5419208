//! # Host-facing workflow
//!
//! `fit` turns observations and priors into an immutable [`PosteriorModel`];
//! `summarize` derives the risk curve and the two scalar posteriors from it.
//! [`fit_and_summarize`] runs the whole cycle for one request and keeps no
//! state between calls.

use std::thread;

use crate::inference::McmcConfig;
use crate::input::{GroupSummary, Observation, build_observations};
use crate::models::logistic::{
    FitReport, LaplaceSampler, NutsSampler, PosteriorDraws, PosteriorSampler, PriorConfig,
    RiskCurvePoint, RiskModel, RiskModelError, SamplerKind, ScalarPosterior, fit_risk_model,
    odds_ratio, risk_curve, risk_difference, specify,
};
use crate::models::logistic::priors::{
    DEFAULT_CENTERING_POINT, DEFAULT_INTERCEPT_PRIOR_SCALE, DEFAULT_SLOPE_PRIOR_SCALE,
};
use crate::preprocess::{
    OutcomeDiagnostics, ReliabilityWarning, outcome_diagnostics, reliability_warnings,
};

/// Workload units per odds-ratio step.
pub const DEFAULT_ODDS_RATIO_INCREMENT: f64 = 10.0;

/// Query points for [`summarize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryQuery {
    pub workload_grid: Vec<f64>,
    pub odds_ratio_increment: f64,
    pub low_workload: f64,
    pub high_workload: f64,
}

impl Default for SummaryQuery {
    fn default() -> Self {
        Self {
            workload_grid: (60..=110).map(f64::from).collect(),
            odds_ratio_increment: DEFAULT_ODDS_RATIO_INCREMENT,
            low_workload: 75.0,
            high_workload: 95.0,
        }
    }
}

/// Fitted posterior shared read-only by every summary call.
#[derive(Debug, Clone)]
pub struct PosteriorModel {
    pub model: RiskModel,
    pub prior: PriorConfig,
    pub draws: PosteriorDraws,
    pub report: FitReport,
}

/// Derived posterior quantities for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSummary {
    pub risk_curve: Vec<RiskCurvePoint>,
    pub odds_ratio: ScalarPosterior,
    pub risk_difference: ScalarPosterior,
    pub odds_ratio_increment: f64,
    pub low_workload: f64,
    pub high_workload: f64,
}

/// Raw inputs for one fit-and-summarise cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRequest {
    pub low: GroupSummary,
    pub high: GroupSummary,
    pub baseline_probability: f64,
    pub centering_point: f64,
    pub intercept_prior_scale: f64,
    pub slope_prior_scale: f64,
    pub query: SummaryQuery,
    pub backend: SamplerKind,
    pub mcmc: McmcConfig,
}

impl RiskRequest {
    /// Request with default priors, sampler and grid; the risk difference
    /// contrasts the two group workloads.
    #[must_use]
    pub fn new(low: GroupSummary, high: GroupSummary, baseline_probability: f64) -> Self {
        Self {
            low,
            high,
            baseline_probability,
            centering_point: DEFAULT_CENTERING_POINT,
            intercept_prior_scale: DEFAULT_INTERCEPT_PRIOR_SCALE,
            slope_prior_scale: DEFAULT_SLOPE_PRIOR_SCALE,
            query: SummaryQuery {
                low_workload: low.workload_level,
                high_workload: high.workload_level,
                ..SummaryQuery::default()
            },
            backend: SamplerKind::default(),
            mcmc: McmcConfig::default(),
        }
    }
}

/// Everything produced by [`fit_and_summarize`].
#[derive(Debug, Clone)]
pub struct RiskAnalysis {
    pub data: OutcomeDiagnostics,
    pub warnings: Vec<ReliabilityWarning>,
    pub posterior: PosteriorModel,
    pub summary: RiskSummary,
}

/// Fit the model with `sampler`.
///
/// # Errors
///
/// Returns `RiskModelError` if the data are degenerate or sampling fails.
pub fn fit<S>(
    observations: &[Observation],
    prior: &PriorConfig,
    sampler: &S,
) -> Result<PosteriorModel, RiskModelError>
where
    S: PosteriorSampler + ?Sized,
{
    let (model, report, draws) = fit_risk_model(observations, prior, sampler)?;
    Ok(PosteriorModel {
        model,
        prior: *prior,
        draws,
        report,
    })
}

/// Compute the risk curve, odds ratio and risk difference concurrently.
///
/// # Errors
///
/// Returns `RiskModelError` if the query is invalid or the posterior is empty.
pub fn summarize(
    posterior: &PosteriorModel,
    query: &SummaryQuery,
) -> Result<RiskSummary, RiskModelError> {
    let draws = &posterior.draws;
    let centering_point = posterior.prior.centering_point();

    let (curve, ratio, difference) = thread::scope(|scope| {
        let curve = scope.spawn(|| risk_curve(draws, centering_point, &query.workload_grid));
        let ratio = scope.spawn(|| odds_ratio(draws, query.odds_ratio_increment));
        let difference = scope.spawn(|| {
            risk_difference(
                draws,
                centering_point,
                query.low_workload,
                query.high_workload,
            )
        });
        (
            join_or_resume(curve),
            join_or_resume(ratio),
            join_or_resume(difference),
        )
    });

    Ok(RiskSummary {
        risk_curve: curve?,
        odds_ratio: ratio?,
        risk_difference: difference?,
        odds_ratio_increment: query.odds_ratio_increment,
        low_workload: query.low_workload,
        high_workload: query.high_workload,
    })
}

fn join_or_resume<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
}

/// Build, specify, fit and summarise for one request.
///
/// # Errors
///
/// Returns `RiskModelError` for invalid counts or priors before any sampling,
/// and for degenerate data or sampler failure afterwards.
pub fn fit_and_summarize(request: &RiskRequest) -> Result<RiskAnalysis, RiskModelError> {
    let observations = build_observations(request.low, request.high)?;
    let prior = specify(
        request.baseline_probability,
        request.centering_point,
        request.intercept_prior_scale,
        request.slope_prior_scale,
    )?;
    let data = outcome_diagnostics(&observations);
    let warnings = reliability_warnings(
        request.low,
        request.high,
        [request.query.low_workload, request.query.high_workload],
    );

    let posterior = match request.backend {
        SamplerKind::Nuts => fit(&observations, &prior, &NutsSampler::new(request.mcmc))?,
        SamplerKind::Laplace => fit(&observations, &prior, &LaplaceSampler::new(request.mcmc))?,
    };
    let summary = summarize(&posterior, &request.query)?;

    Ok(RiskAnalysis {
        data,
        warnings,
        posterior,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::logistic::PosteriorDraw;

    fn fixed_model() -> PosteriorModel {
        let chains = vec![
            vec![
                PosteriorDraw {
                    intercept: -1.0,
                    slope: 0.04,
                },
                PosteriorDraw {
                    intercept: -0.9,
                    slope: 0.05,
                },
            ],
            vec![
                PosteriorDraw {
                    intercept: -1.1,
                    slope: 0.03,
                },
                PosteriorDraw {
                    intercept: -1.0,
                    slope: 0.045,
                },
            ],
        ];
        PosteriorModel {
            model: RiskModel {
                n_observations: 0,
                n_events: 0,
                distinct_workloads: 0,
                centering_point: 85.0,
            },
            prior: PriorConfig::default(),
            draws: PosteriorDraws::from_chains(chains).expect("chains are consistent"),
            report: FitReport::default(),
        }
    }

    #[test]
    fn default_query_matches_unit_grid() {
        let query = SummaryQuery::default();
        assert_eq!(query.workload_grid.len(), 51);
        assert!((query.odds_ratio_increment - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summarize_is_repeatable_on_shared_draws() {
        let model = fixed_model();
        let query = SummaryQuery::default();
        let first = summarize(&model, &query).expect("summary should work");
        let second = summarize(&model, &query).expect("summary should work");
        assert_eq!(first, second);
        assert_eq!(first.risk_curve.len(), 51);
        assert_eq!(first.odds_ratio.len(), 4);
        assert!(first.risk_difference.values().iter().all(|value| *value > 0.0));
    }

    #[test]
    fn summarize_rejects_invalid_query() {
        let model = fixed_model();
        let query = SummaryQuery {
            workload_grid: Vec::new(),
            ..SummaryQuery::default()
        };
        assert_eq!(
            summarize(&model, &query),
            Err(RiskModelError::InvalidWorkloadGrid)
        );
    }

    #[test]
    fn request_contrasts_group_workloads() {
        let request = RiskRequest::new(
            GroupSummary::new(50, 5, 70.0),
            GroupSummary::new(50, 10, 100.0),
            0.2,
        );
        assert!((request.query.low_workload - 70.0).abs() < f64::EPSILON);
        assert!((request.query.high_workload - 100.0).abs() < f64::EPSILON);
        assert_eq!(request.backend, SamplerKind::Nuts);
    }

    #[test]
    fn invalid_counts_fail_before_sampling() {
        let request = RiskRequest::new(
            GroupSummary::new(100, 150, 75.0),
            GroupSummary::new(100, 30, 95.0),
            0.3,
        );
        let err = fit_and_summarize(&request).expect_err("counts are invalid");
        assert!(matches!(err, RiskModelError::InvalidInput(_)));
    }

    #[test]
    fn invalid_baseline_fails_before_sampling() {
        let request = RiskRequest::new(
            GroupSummary::new(100, 15, 75.0),
            GroupSummary::new(100, 30, 95.0),
            1.0,
        );
        assert_eq!(
            fit_and_summarize(&request).expect_err("baseline is invalid"),
            RiskModelError::InvalidProbability { value: 1.0 }
        );
    }
}
