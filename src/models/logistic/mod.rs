//! Bayesian logistic regression of injury risk on a centred workload.
//!
//! `logit P(injury) = intercept + slope * (workload - centering_point)` with
//! independent Normal priors. Sampling uses multi-chain NUTS by default; a
//! Laplace approximation satisfies the same [`PosteriorSampler`] contract.

pub mod adapt;
pub mod diagnostics;
pub mod effects;
pub mod laplace;
pub mod likelihood;
pub mod nuts;
pub mod posterior;
pub mod priors;
pub mod sampler;
pub mod types;

pub use diagnostics::{autocorrelation, effective_sample_size, summarize_convergence};
pub use effects::{
    HistogramBin, IntervalSummary, RiskCurvePoint, ScalarPosterior, odds_ratio, risk_at,
    risk_curve, risk_difference, workload_grid,
};
pub use laplace::{LaplaceSampler, PosteriorMode, posterior_mode};
pub use likelihood::{LogPosterior, logistic_stable, predicted_risk};
pub use posterior::{
    ParameterSummary, PosteriorDraw, PosteriorDraws, PosteriorSummary, summarize_posterior,
};
pub use priors::{PriorConfig, logit, specify};
pub use sampler::{
    NutsSampler, PosteriorSampler, SampledPosterior, fit_risk_model, sample_posterior,
};
pub use types::{
    ConvergenceSummary, FitReport, RiskModel, RiskModelError, SamplerDiagnostics, SamplerFailure,
    SamplerKind,
};
