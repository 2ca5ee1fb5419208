//! Core public types for the workload-risk logistic model.

use thiserror::Error;

use super::posterior::PosteriorSummary;
use crate::inference::{InferenceError, TransitionStats};
use crate::input::InputError;

/// Errors returned by prior specification, fitting, and summarisation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskModelError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    InvalidConfig(#[from] InferenceError),
    #[error("baseline probability must lie strictly between 0 and 1; found {value}")]
    InvalidProbability { value: f64 },
    #[error("{parameter} prior scale must be finite and positive; found {value}")]
    InvalidPriorScale { parameter: &'static str, value: f64 },
    #[error("centering point must be finite; found {0}")]
    InvalidCenteringPoint(f64),
    #[error("at least one observation is required")]
    EmptyObservations,
    #[error(
        "all {observations} observations share outcome {outcome}; intercept and slope are not identifiable"
    )]
    InsufficientVariation { outcome: bool, observations: usize },
    #[error("sampler did not produce trustworthy draws: {0}")]
    SamplerDivergence(#[from] SamplerFailure),
    #[error("posterior draws are required")]
    EmptyPosterior,
    #[error("every chain must hold the same number of draws")]
    InconsistentChains,
    #[error("workload grid must be non-empty and finite")]
    InvalidWorkloadGrid,
    #[error("workload increment must be finite; found {0}")]
    InvalidIncrement(f64),
    #[error("histogram bin count must be positive")]
    InvalidHistogramBins,
    #[error("query workloads must be finite")]
    NonFiniteQuery,
}

/// Reason a sampler run was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SamplerFailure {
    #[error("{divergent} of {transitions} post-warm-up transitions diverged")]
    ExcessiveDivergences { divergent: usize, transitions: usize },
    #[error("chains did not mix: max split-R-hat {max_split_rhat:.3} exceeds {threshold:.3}")]
    PoorMixing { max_split_rhat: f64, threshold: f64 },
    #[error("log density is not finite at the starting point")]
    NonFiniteDensity,
    #[error("posterior curvature at the mode is not negative definite")]
    IndefiniteCurvature,
    #[error("posterior mode search did not converge")]
    ModeNotFound,
    #[error("linear solve failed")]
    SolveFailed,
    #[error("worker for chain {chain} panicked")]
    ChainPanicked { chain: usize },
}

/// Which sampling backend produced a set of draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerKind {
    /// Multi-chain No-U-Turn Hamiltonian Monte Carlo.
    #[default]
    Nuts,
    /// Independent draws from the Gaussian approximation at the posterior mode.
    Laplace,
}

/// Fitted model metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskModel {
    pub n_observations: usize,
    pub n_events: usize,
    pub distinct_workloads: usize,
    pub centering_point: f64,
}

/// Multi-chain split-R-hat and effective-sample-size summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConvergenceSummary {
    /// Number of chains included.
    pub chain_count: usize,
    /// Draws per chain used after truncation to equal even length.
    pub draws_per_chain_used: usize,
    pub intercept_split_rhat: f64,
    pub slope_split_rhat: f64,
    /// Maximum split-R-hat across both parameters.
    pub max_split_rhat: f64,
    /// Effective sample size summed across chains.
    pub intercept_ess: f64,
    pub slope_ess: f64,
}

/// Sampler diagnostics summary.
#[derive(Debug, Clone, Default)]
pub struct SamplerDiagnostics {
    pub backend: SamplerKind,
    pub chains: usize,
    pub draws_per_chain: usize,
    /// Post-warm-up transition counters pooled over chains (NUTS only).
    pub transitions: TransitionStats,
    /// Adapted step size per chain (NUTS only).
    pub step_sizes: Vec<f64>,
    pub convergence: Option<ConvergenceSummary>,
}

/// Output report from fitting.
#[derive(Debug, Clone, Default)]
pub struct FitReport {
    pub diagnostics: SamplerDiagnostics,
    pub posterior_summary: Option<PosteriorSummary>,
}
