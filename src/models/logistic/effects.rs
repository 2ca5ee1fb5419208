//! Derived posterior quantities: risk curve, odds ratio, and risk difference.

use num_traits::ToPrimitive;

use crate::utils::{mean, percentile, sorted_copy, usize_to_f64};

use super::likelihood::predicted_risk;
use super::posterior::PosteriorDraws;
use super::types::RiskModelError;

/// Posterior mean risk and central 95% credible band at one workload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskCurvePoint {
    pub workload: f64,
    pub mean_risk: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

/// Posterior summary interval for a scalar quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntervalSummary {
    pub mean: f64,
    pub q025: f64,
    pub q50: f64,
    pub q975: f64,
}

/// Equal-width histogram bin `[lower, upper)`; the last bin is closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// One transformed value per posterior draw, in draw order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarPosterior {
    values: Vec<f64>,
}

impl ScalarPosterior {
    #[must_use]
    pub const fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean and 2.5/50/97.5 percentiles; every field is `NaN` when empty.
    #[must_use]
    pub fn summary(&self) -> IntervalSummary {
        let sorted = sorted_copy(&self.values);
        IntervalSummary {
            mean: mean(&self.values),
            q025: percentile(&sorted, 0.025),
            q50: percentile(&sorted, 0.5),
            q975: percentile(&sorted, 0.975),
        }
    }

    /// Empirical quantile with linear interpolation.
    #[must_use]
    pub fn quantile(&self, probability: f64) -> f64 {
        percentile(&sorted_copy(&self.values), probability)
    }

    /// Posterior probability that the quantity exceeds `threshold`.
    #[must_use]
    pub fn probability_above(&self, threshold: f64) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        let above = self.values.iter().filter(|value| **value > threshold).count();
        usize_to_f64(above) / usize_to_f64(self.values.len())
    }

    #[must_use]
    pub fn probability_positive(&self) -> f64 {
        self.probability_above(0.0)
    }

    /// Equal-width histogram over the observed range.
    ///
    /// # Errors
    ///
    /// Returns `RiskModelError` if `bins` is zero or there are no values.
    pub fn histogram(&self, bins: usize) -> Result<Vec<HistogramBin>, RiskModelError> {
        if bins == 0 {
            return Err(RiskModelError::InvalidHistogramBins);
        }
        if self.values.is_empty() {
            return Err(RiskModelError::EmptyPosterior);
        }

        let (mut low, mut high) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
                (lo.min(*value), hi.max(*value))
            });
        if high <= low {
            low -= 0.5;
            high += 0.5;
        }
        let width = (high - low) / usize_to_f64(bins);

        let mut histogram = (0..bins)
            .map(|index| HistogramBin {
                lower: width.mul_add(usize_to_f64(index), low),
                upper: width.mul_add(usize_to_f64(index + 1), low),
                count: 0,
            })
            .collect::<Vec<_>>();
        for value in &self.values {
            let index = ((value - low) / width)
                .floor()
                .to_usize()
                .unwrap_or(0)
                .min(bins - 1);
            histogram[index].count += 1;
        }
        Ok(histogram)
    }
}

/// Evenly spaced workloads from `start` through `end` inclusive.
///
/// # Errors
///
/// Returns `RiskModelError::InvalidWorkloadGrid` unless all values are finite,
/// `step > 0` and `end >= start`.
pub fn workload_grid(start: f64, end: f64, step: f64) -> Result<Vec<f64>, RiskModelError> {
    if !(start.is_finite() && end.is_finite() && step.is_finite() && step > 0.0 && end >= start) {
        return Err(RiskModelError::InvalidWorkloadGrid);
    }
    let intervals = ((end - start) / step + 1e-9)
        .floor()
        .to_usize()
        .ok_or(RiskModelError::InvalidWorkloadGrid)?;
    Ok((0..=intervals)
        .map(|index| step.mul_add(usize_to_f64(index), start))
        .collect())
}

/// Predicted risk at `workload` for every draw.
///
/// # Errors
///
/// Returns `RiskModelError` if draws are missing or inputs are not finite.
pub fn risk_at(
    draws: &PosteriorDraws,
    centering_point: f64,
    workload: f64,
) -> Result<ScalarPosterior, RiskModelError> {
    validate_draws(draws, centering_point)?;
    if !workload.is_finite() {
        return Err(RiskModelError::NonFiniteQuery);
    }
    Ok(risk_values(draws, centering_point, workload))
}

/// Mean risk and 95% credible band at each grid workload.
///
/// The band is widened to contain the mean when the per-draw risks are so
/// skewed that the mean falls outside the 2.5% to 97.5% quantile range.
///
/// # Errors
///
/// Returns `RiskModelError` if draws are missing, the grid is empty or not
/// finite, or the centering point is not finite.
pub fn risk_curve(
    draws: &PosteriorDraws,
    centering_point: f64,
    workload_grid: &[f64],
) -> Result<Vec<RiskCurvePoint>, RiskModelError> {
    validate_draws(draws, centering_point)?;
    if workload_grid.is_empty() || workload_grid.iter().any(|value| !value.is_finite()) {
        return Err(RiskModelError::InvalidWorkloadGrid);
    }

    Ok(workload_grid
        .iter()
        .map(|&workload| {
            let summary = risk_values(draws, centering_point, workload).summary();
            RiskCurvePoint {
                workload,
                mean_risk: summary.mean,
                lower_ci: summary.q025.min(summary.mean),
                upper_ci: summary.q975.max(summary.mean),
            }
        })
        .collect())
}

/// Odds multiplier `exp(increment * slope)` per draw.
///
/// # Errors
///
/// Returns `RiskModelError` if draws are missing or `increment` is not finite.
pub fn odds_ratio(
    draws: &PosteriorDraws,
    increment: f64,
) -> Result<ScalarPosterior, RiskModelError> {
    if draws.is_empty() {
        return Err(RiskModelError::EmptyPosterior);
    }
    if !increment.is_finite() {
        return Err(RiskModelError::InvalidIncrement(increment));
    }
    Ok(ScalarPosterior::new(
        draws
            .iter()
            .map(|draw| (increment * draw.slope).exp())
            .collect(),
    ))
}

/// Risk at `high_workload` minus risk at `low_workload`, per draw.
///
/// # Errors
///
/// Returns `RiskModelError` if draws are missing or any input is not finite.
pub fn risk_difference(
    draws: &PosteriorDraws,
    centering_point: f64,
    low_workload: f64,
    high_workload: f64,
) -> Result<ScalarPosterior, RiskModelError> {
    validate_draws(draws, centering_point)?;
    if !(low_workload.is_finite() && high_workload.is_finite()) {
        return Err(RiskModelError::NonFiniteQuery);
    }
    Ok(ScalarPosterior::new(
        draws
            .iter()
            .map(|draw| {
                predicted_risk(draw.intercept, draw.slope, high_workload, centering_point)
                    - predicted_risk(draw.intercept, draw.slope, low_workload, centering_point)
            })
            .collect(),
    ))
}

fn risk_values(draws: &PosteriorDraws, centering_point: f64, workload: f64) -> ScalarPosterior {
    ScalarPosterior::new(
        draws
            .iter()
            .map(|draw| predicted_risk(draw.intercept, draw.slope, workload, centering_point))
            .collect(),
    )
}

fn validate_draws(draws: &PosteriorDraws, centering_point: f64) -> Result<(), RiskModelError> {
    if draws.is_empty() {
        return Err(RiskModelError::EmptyPosterior);
    }
    if !centering_point.is_finite() {
        return Err(RiskModelError::InvalidCenteringPoint(centering_point));
    }
    Ok(())
}
