//! Prior specification for the intercept and slope.
//!
//! The intercept prior is centred on the logit of a user-chosen baseline
//! injury probability at the centering workload; the slope prior is centred
//! on zero ("no workload effect").

use statrs::distribution::{Continuous, Normal};

use super::types::RiskModelError;

/// Workload at which the intercept is interpreted.
pub const DEFAULT_CENTERING_POINT: f64 = 85.0;
/// Baseline injury probability used when the host supplies none.
pub const DEFAULT_BASELINE_PROBABILITY: f64 = 0.20;
/// Standard deviation of the intercept prior on the log-odds scale.
pub const DEFAULT_INTERCEPT_PRIOR_SCALE: f64 = 1.0;
/// Standard deviation of the slope prior, in log-odds per workload unit.
pub const DEFAULT_SLOPE_PRIOR_SCALE: f64 = 1.0;

/// Hyperparameters for the two independent Normal priors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorConfig {
    centering_point: f64,
    baseline_probability: f64,
    intercept_prior_location: f64,
    intercept_prior_scale: f64,
    slope_prior_scale: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            centering_point: DEFAULT_CENTERING_POINT,
            baseline_probability: DEFAULT_BASELINE_PROBABILITY,
            intercept_prior_location: logit(DEFAULT_BASELINE_PROBABILITY),
            intercept_prior_scale: DEFAULT_INTERCEPT_PRIOR_SCALE,
            slope_prior_scale: DEFAULT_SLOPE_PRIOR_SCALE,
        }
    }
}

impl PriorConfig {
    #[must_use]
    pub const fn centering_point(&self) -> f64 {
        self.centering_point
    }

    #[must_use]
    pub const fn baseline_probability(&self) -> f64 {
        self.baseline_probability
    }

    /// `logit(baseline_probability)`.
    #[must_use]
    pub const fn intercept_prior_location(&self) -> f64 {
        self.intercept_prior_location
    }

    #[must_use]
    pub const fn intercept_prior_scale(&self) -> f64 {
        self.intercept_prior_scale
    }

    /// The slope prior is always centred at zero.
    #[must_use]
    pub const fn slope_prior_location(&self) -> f64 {
        0.0
    }

    #[must_use]
    pub const fn slope_prior_scale(&self) -> f64 {
        self.slope_prior_scale
    }

    /// Same scales and centering, new baseline probability.
    ///
    /// # Errors
    ///
    /// Returns `RiskModelError::InvalidProbability` outside the open unit interval.
    pub fn with_baseline_probability(
        self,
        baseline_probability: f64,
    ) -> Result<Self, RiskModelError> {
        specify(
            baseline_probability,
            self.centering_point,
            self.intercept_prior_scale,
            self.slope_prior_scale,
        )
    }

    /// Joint log prior density of `(intercept, slope)`.
    #[must_use]
    pub fn log_density(&self, intercept: f64, slope: f64) -> f64 {
        log_normal_density(
            intercept,
            self.intercept_prior_location,
            self.intercept_prior_scale,
        ) + log_normal_density(slope, 0.0, self.slope_prior_scale)
    }
}

/// Build a prior configuration from a baseline probability and fixed scales.
///
/// # Errors
///
/// Returns `RiskModelError::InvalidProbability` unless `0 < baseline_probability < 1`,
/// `InvalidCenteringPoint` for a non-finite centering point, and
/// `InvalidPriorScale` for non-positive or non-finite scales.
pub fn specify(
    baseline_probability: f64,
    centering_point: f64,
    intercept_scale: f64,
    slope_scale: f64,
) -> Result<PriorConfig, RiskModelError> {
    if !(baseline_probability > 0.0 && baseline_probability < 1.0) {
        return Err(RiskModelError::InvalidProbability {
            value: baseline_probability,
        });
    }
    if !centering_point.is_finite() {
        return Err(RiskModelError::InvalidCenteringPoint(centering_point));
    }
    validate_scale("intercept", intercept_scale)?;
    validate_scale("slope", slope_scale)?;

    Ok(PriorConfig {
        centering_point,
        baseline_probability,
        intercept_prior_location: logit(baseline_probability),
        intercept_prior_scale: intercept_scale,
        slope_prior_scale: slope_scale,
    })
}

fn validate_scale(parameter: &'static str, value: f64) -> Result<(), RiskModelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RiskModelError::InvalidPriorScale { parameter, value })
    }
}

/// `ln(p / (1 - p))`.
#[must_use]
pub fn logit(probability: f64) -> f64 {
    (probability / (1.0 - probability)).ln()
}

/// Log-density for `Normal(mean, sd)`.
#[must_use]
pub fn log_normal_density(value: f64, mean: f64, sd: f64) -> f64 {
    Normal::new(mean, sd).map_or(f64::NEG_INFINITY, |normal| normal.ln_pdf(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::logistic::likelihood::logistic_stable;
    use approx::assert_relative_eq;

    #[test]
    fn prior_defaults_match_constants() {
        let prior = PriorConfig::default();
        assert_relative_eq!(prior.centering_point(), 85.0);
        assert_relative_eq!(logistic_stable(prior.intercept_prior_location()), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn specify_inverts_logistic() {
        for probability in [0.01, 0.15, 0.3, 0.5, 0.6, 0.99] {
            let prior = specify(probability, 85.0, 1.0, 1.0).expect("probability is valid");
            assert_relative_eq!(
                logistic_stable(prior.intercept_prior_location()),
                probability,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn specify_rejects_boundary_probabilities() {
        for probability in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let err = specify(probability, 85.0, 1.0, 1.0).expect_err("probability is invalid");
            assert!(matches!(err, RiskModelError::InvalidProbability { .. }));
        }
    }

    #[test]
    fn specify_rejects_non_positive_scale() {
        let err = specify(0.3, 85.0, 1.0, 0.0).expect_err("scale is invalid");
        assert_eq!(
            err,
            RiskModelError::InvalidPriorScale {
                parameter: "slope",
                value: 0.0
            }
        );
    }

    #[test]
    fn slope_prior_is_centred_at_zero() {
        let prior = specify(0.3, 85.0, 1.0, 0.5).expect("inputs are valid");
        assert_relative_eq!(prior.slope_prior_location(), 0.0);
        assert!(prior.log_density(prior.intercept_prior_location(), 0.0)
            > prior.log_density(prior.intercept_prior_location(), 0.5));
    }

    #[test]
    fn baseline_update_keeps_scales() {
        let prior = specify(0.3, 90.0, 0.5, 0.25).expect("inputs are valid");
        let updated = prior
            .with_baseline_probability(0.1)
            .expect("probability is valid");
        assert_relative_eq!(updated.centering_point(), 90.0);
        assert_relative_eq!(updated.intercept_prior_scale(), 0.5);
        assert_relative_eq!(updated.slope_prior_scale(), 0.25);
        assert_relative_eq!(updated.baseline_probability(), 0.1);
        assert!(prior.with_baseline_probability(0.0).is_err());
    }

    #[test]
    fn normal_density_matches_closed_form() {
        let expected = -0.5 * (std::f64::consts::TAU.ln() + 4.0_f64.ln() + 0.25);
        assert_relative_eq!(log_normal_density(2.0, 1.0, 2.0), expected, epsilon = 1e-12);
    }
}
