#![forbid(unsafe_code)]

//! # `workload_risk`
//!
//! Bayesian logistic regression of a binary injury outcome on a continuous
//! workload measure, fitted from two group summaries.
//!
//! The pipeline expands group counts into observations, converts a baseline
//! probability into an intercept prior, samples the two-parameter posterior
//! with multi-chain NUTS (or a Laplace approximation), and derives a risk
//! curve with credible bands, an odds ratio per workload increment, and a
//! risk difference between two workloads.
//!
//! ```no_run
//! use workload_risk::{GroupSummary, RiskRequest, fit_and_summarize, render_risk_tables};
//!
//! let request = RiskRequest::new(
//!     GroupSummary::new(100, 15, 75.0),
//!     GroupSummary::new(100, 30, 95.0),
//!     0.30,
//! );
//! let analysis = fit_and_summarize(&request).expect("fit should succeed");
//! println!("{}", render_risk_tables(&analysis).effects);
//! ```

pub mod inference;
pub mod input;
pub mod models;
pub mod preprocess;
pub mod utils;
pub mod workflow;

pub use inference::{InferenceError, McmcConfig, TransitionStats};
pub use input::{
    CountBound, GroupSummary, InputError, Observation, WorkloadCell, WorkloadGroup,
    build_observations, workload_cells,
};
pub use preprocess::{
    OutcomeDiagnostics, ReliabilityWarning, outcome_diagnostics, outcome_has_variation,
    reliability_warnings,
};

pub use models::logistic::{
    ConvergenceSummary, FitReport, HistogramBin, IntervalSummary, LaplaceSampler, LogPosterior,
    NutsSampler, ParameterSummary, PosteriorDraw, PosteriorDraws, PosteriorMode,
    PosteriorSampler, PosteriorSummary, PriorConfig, RiskCurvePoint, RiskModel, RiskModelError,
    SampledPosterior, SamplerDiagnostics, SamplerFailure, SamplerKind, ScalarPosterior,
    autocorrelation, effective_sample_size, fit_risk_model, logistic_stable, logit, odds_ratio,
    posterior_mode, predicted_risk, risk_at, risk_curve, risk_difference, sample_posterior,
    specify, summarize_convergence, summarize_posterior, workload_grid,
};
pub use models::report::{RiskTables, render_risk_tables};
pub use workflow::{
    PosteriorModel, RiskAnalysis, RiskRequest, RiskSummary, SummaryQuery, fit,
    fit_and_summarize, summarize,
};
