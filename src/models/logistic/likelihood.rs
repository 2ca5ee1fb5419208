//! Bernoulli-logistic likelihood, log posterior, and numerical-stability helpers.

use faer::Mat;

use crate::input::{Observation, workload_cells};
use crate::utils::usize_to_f64;

use super::priors::PriorConfig;

/// Stable logistic transform.
#[must_use]
pub fn logistic_stable(value: f64) -> f64 {
    if value >= 0.0 {
        let z = (-value).exp();
        1.0 / (1.0 + z)
    } else {
        let z = value.exp();
        z / (1.0 + z)
    }
}

/// Stable `ln(1 + exp(value))`.
#[must_use]
pub fn softplus(value: f64) -> f64 {
    if value > 0.0 {
        value + (-value).exp().ln_1p()
    } else {
        value.exp().ln_1p()
    }
}

/// Predicted injury probability at `workload` for one parameter draw.
#[must_use]
pub fn predicted_risk(intercept: f64, slope: f64, workload: f64, centering_point: f64) -> f64 {
    logistic_stable(slope.mul_add(workload - centering_point, intercept))
}

/// Counts at one centred workload value.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CenteredCell {
    centered_workload: f64,
    subjects: f64,
    events: f64,
}

/// Unnormalised log posterior over `(intercept, slope)`.
///
/// Observations are collapsed to workload cells; the Bernoulli likelihood of a
/// cell with `k` events among `n` subjects is `k * eta - n * ln(1 + e^eta)`.
#[derive(Debug, Clone)]
pub struct LogPosterior {
    cells: Vec<CenteredCell>,
    prior: PriorConfig,
}

impl LogPosterior {
    #[must_use]
    pub fn new(observations: &[Observation], prior: PriorConfig) -> Self {
        let cells = workload_cells(observations)
            .into_iter()
            .map(|cell| CenteredCell {
                centered_workload: cell.workload - prior.centering_point(),
                subjects: usize_to_f64(cell.subjects),
                events: usize_to_f64(cell.events),
            })
            .collect();
        Self { cells, prior }
    }

    #[must_use]
    pub const fn prior(&self) -> &PriorConfig {
        &self.prior
    }

    /// Number of parameters.
    #[must_use]
    pub const fn dim(&self) -> usize {
        2
    }

    #[must_use]
    pub fn log_likelihood(&self, theta: [f64; 2]) -> f64 {
        let [intercept, slope] = theta;
        self.cells
            .iter()
            .map(|cell| {
                let eta = slope.mul_add(cell.centered_workload, intercept);
                cell.events * eta - cell.subjects * softplus(eta)
            })
            .sum()
    }

    #[must_use]
    pub fn log_density(&self, theta: [f64; 2]) -> f64 {
        self.log_likelihood(theta) + self.prior.log_density(theta[0], theta[1])
    }

    /// Gradient of [`Self::log_density`].
    #[must_use]
    pub fn gradient(&self, theta: [f64; 2]) -> [f64; 2] {
        let [intercept, slope] = theta;
        let mut grad = [
            -(intercept - self.prior.intercept_prior_location())
                / self.prior.intercept_prior_scale().powi(2),
            -(slope - self.prior.slope_prior_location()) / self.prior.slope_prior_scale().powi(2),
        ];
        for cell in &self.cells {
            let eta = slope.mul_add(cell.centered_workload, intercept);
            let residual = cell.subjects.mul_add(-logistic_stable(eta), cell.events);
            grad[0] += residual;
            grad[1] += residual * cell.centered_workload;
        }
        grad
    }

    /// Negative Hessian (observed information plus prior precision).
    #[must_use]
    pub fn negative_hessian(&self, theta: [f64; 2]) -> Mat<f64> {
        let [intercept, slope] = theta;
        let mut info = [
            [self.prior.intercept_prior_scale().powi(-2), 0.0],
            [0.0, self.prior.slope_prior_scale().powi(-2)],
        ];
        for cell in &self.cells {
            let p = logistic_stable(slope.mul_add(cell.centered_workload, intercept));
            let weight = cell.subjects * p * (1.0 - p);
            let x = cell.centered_workload;
            info[0][0] += weight;
            info[0][1] += weight * x;
            info[1][0] += weight * x;
            info[1][1] += weight * x * x;
        }
        Mat::from_fn(2, 2, |row, col| info[row][col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{GroupSummary, build_observations};
    use crate::models::logistic::priors::specify;
    use approx::assert_relative_eq;

    fn scenario_posterior() -> LogPosterior {
        let observations = build_observations(
            GroupSummary::new(100, 15, 75.0),
            GroupSummary::new(100, 30, 95.0),
        )
        .expect("counts are valid");
        let prior = specify(0.3, 85.0, 1.0, 1.0).expect("prior is valid");
        LogPosterior::new(&observations, prior)
    }

    #[test]
    fn logistic_is_bounded() {
        let low = logistic_stable(-1_000.0);
        let high = logistic_stable(1_000.0);
        assert!(low >= 0.0);
        assert!(high <= 1.0);
        assert_relative_eq!(logistic_stable(0.0), 0.5);
    }

    #[test]
    fn softplus_is_stable_in_both_tails() {
        assert_relative_eq!(softplus(800.0), 800.0);
        assert!(softplus(-800.0) >= 0.0);
        assert_relative_eq!(softplus(0.0), std::f64::consts::LN_2);
    }

    #[test]
    fn cell_likelihood_matches_per_observation_sum() {
        let observations = build_observations(
            GroupSummary::new(6, 2, 80.0),
            GroupSummary::new(5, 4, 92.0),
        )
        .expect("counts are valid");
        let prior = specify(0.3, 85.0, 1.0, 1.0).expect("prior is valid");
        let posterior = LogPosterior::new(&observations, prior);
        let theta = [-0.4, 0.07];

        let direct: f64 = observations
            .iter()
            .map(|obs| {
                let p = predicted_risk(theta[0], theta[1], obs.workload, 85.0);
                if obs.outcome { p.ln() } else { (1.0 - p).ln() }
            })
            .sum();
        assert_relative_eq!(posterior.log_likelihood(theta), direct, epsilon = 1e-10);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let posterior = scenario_posterior();
        let theta = [-1.1, 0.03];
        let grad = posterior.gradient(theta);
        let h = 1e-6;
        for index in 0..2 {
            let mut forward = theta;
            let mut backward = theta;
            forward[index] += h;
            backward[index] -= h;
            let numeric =
                (posterior.log_density(forward) - posterior.log_density(backward)) / (2.0 * h);
            assert_relative_eq!(grad[index], numeric, epsilon = 1e-4, max_relative = 1e-5);
        }
    }

    #[test]
    fn negative_hessian_is_symmetric_positive_definite() {
        let posterior = scenario_posterior();
        let info = posterior.negative_hessian([-1.2, 0.04]);
        assert_relative_eq!(info[(0, 1)], info[(1, 0)]);
        assert!(info[(0, 0)] > 0.0);
        assert!(info[(0, 0)] * info[(1, 1)] - info[(0, 1)] * info[(1, 0)] > 0.0);
    }
}
