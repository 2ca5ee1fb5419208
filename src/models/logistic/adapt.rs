//! Warm-up adaptation for NUTS: dual-averaging step size and windowed
//! diagonal mass-matrix estimation.

use crate::utils::usize_to_f64;

use super::likelihood::LogPosterior;
use super::nuts::{PhasePoint, leapfrog};

/// Dual averaging of the log step size toward a target acceptance statistic.
#[derive(Debug, Clone, Copy)]
pub struct DualAveraging {
    target_accept: f64,
    log_step: f64,
    log_step_bar: f64,
    h_bar: f64,
    mu: f64,
    gamma: f64,
    t0: f64,
    kappa: f64,
    step: usize,
}

impl DualAveraging {
    #[must_use]
    pub fn new(target_accept: f64, initial_step: f64) -> Self {
        let log_step = initial_step.ln();
        Self {
            target_accept,
            log_step,
            log_step_bar: log_step,
            h_bar: 0.0,
            mu: (10.0 * initial_step).ln(),
            gamma: 0.05,
            t0: 10.0,
            kappa: 0.75,
            step: 0,
        }
    }

    /// Record the acceptance statistic of one transition.
    pub fn update(&mut self, accept_prob: f64) {
        self.step += 1;
        let m = usize_to_f64(self.step);
        let weight = 1.0 / (m + self.t0);
        self.h_bar = (1.0 - weight).mul_add(self.h_bar, weight * (self.target_accept - accept_prob));
        self.log_step = self.mu - (m.sqrt() / self.gamma) * self.h_bar;
        let m_kappa = m.powf(-self.kappa);
        self.log_step_bar = m_kappa.mul_add(self.log_step, (1.0 - m_kappa) * self.log_step_bar);
    }

    /// Step size to use for the next warm-up transition.
    #[must_use]
    pub fn current_step_size(&self) -> f64 {
        self.log_step.exp()
    }

    /// Smoothed step size used after warm-up.
    #[must_use]
    pub fn adapted_step_size(&self) -> f64 {
        self.log_step_bar.exp()
    }

    /// Restart averaging around `initial_step`.
    pub fn restart(&mut self, initial_step: f64) {
        *self = Self::new(self.target_accept, initial_step);
    }
}

/// Online per-coordinate variance (Welford).
#[derive(Debug, Clone, Copy, Default)]
pub struct WelfordVariance {
    mean: [f64; 2],
    m2: [f64; 2],
    count: usize,
}

impl WelfordVariance {
    pub fn update(&mut self, point: [f64; 2]) {
        self.count += 1;
        let n = usize_to_f64(self.count);
        for index in 0..2 {
            let delta = point[index] - self.mean[index];
            self.mean[index] += delta / n;
            self.m2[index] += delta * (point[index] - self.mean[index]);
        }
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Sample variance shrunk toward `1e-3` as in Stan's diagonal adaptation.
    /// `None` with fewer than three samples.
    #[must_use]
    pub fn regularized_variance(&self) -> Option<[f64; 2]> {
        if self.count < 3 {
            return None;
        }
        let n = usize_to_f64(self.count);
        let shrink = n / (n + 5.0);
        Some(self.m2.map(|m2| {
            let variance = m2 / (n - 1.0);
            shrink.mul_add(variance, 1e-3 * (5.0 / (n + 5.0)))
        }))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stan-style warm-up windows `[start, end)`.
///
/// A fast initial buffer (step size only), doubling slow windows that also
/// estimate the metric, and a terminal buffer (step size only). Short warm-ups
/// adapt the step size alone.
#[must_use]
pub fn compute_windows(warmup: usize) -> Vec<(usize, usize)> {
    if warmup < 50 {
        return vec![(0, warmup)];
    }

    let init_buffer = 75.min(warmup / 5);
    let term_buffer = 50.min(warmup / 5);
    let slow_end = warmup - term_buffer;

    let mut windows = vec![(0, init_buffer)];
    let mut start = init_buffer;
    let mut size = 25;
    while start < slow_end {
        let mut end = (start + size).min(slow_end);
        // Merge a trailing window shorter than its successor would be.
        if slow_end - end < 2 * size {
            end = slow_end;
        }
        windows.push((start, end));
        start = end;
        size *= 2;
    }
    windows.push((slow_end, warmup));
    windows
}

/// Step-size and diagonal-metric adaptation driven by the window schedule.
#[derive(Debug, Clone)]
pub struct WindowedAdaptation {
    dual_averaging: DualAveraging,
    welford: WelfordVariance,
    windows: Vec<(usize, usize)>,
    current_window: usize,
    inv_mass: [f64; 2],
}

impl WindowedAdaptation {
    #[must_use]
    pub fn new(warmup: usize, target_accept: f64, initial_step: f64, inv_mass: [f64; 2]) -> Self {
        Self {
            dual_averaging: DualAveraging::new(target_accept, initial_step),
            welford: WelfordVariance::default(),
            windows: compute_windows(warmup),
            current_window: 0,
            inv_mass,
        }
    }

    /// Feed warm-up iteration `iteration`. Returns `true` when the metric changed,
    /// in which case the caller should search for a new initial step size and
    /// pass it to [`Self::restart_step_size`].
    pub fn update(&mut self, iteration: usize, point: [f64; 2], accept_prob: f64) -> bool {
        self.dual_averaging.update(accept_prob);

        let Some(&(_, end)) = self.windows.get(self.current_window) else {
            return false;
        };
        let is_slow = self.current_window > 0 && self.current_window + 1 < self.windows.len();
        if is_slow {
            self.welford.update(point);
        }
        if iteration + 1 < end {
            return false;
        }

        self.current_window += 1;
        let mut metric_updated = false;
        if is_slow {
            if let Some(variance) = self.welford.regularized_variance() {
                self.inv_mass = variance;
                metric_updated = true;
            }
            self.welford.reset();
        }
        let step = self.dual_averaging.adapted_step_size();
        self.dual_averaging.restart(step);
        metric_updated
    }

    pub fn restart_step_size(&mut self, step_size: f64) {
        self.dual_averaging.restart(step_size);
    }

    #[must_use]
    pub fn step_size(&self) -> f64 {
        self.dual_averaging.current_step_size()
    }

    #[must_use]
    pub fn adapted_step_size(&self) -> f64 {
        self.dual_averaging.adapted_step_size()
    }

    /// Current inverse mass (posterior variance estimate) per coordinate.
    #[must_use]
    pub const fn inv_mass(&self) -> [f64; 2] {
        self.inv_mass
    }
}

/// Heuristic initial step size: double or halve until a single leapfrog step
/// with unit momentum crosses acceptance 0.5 (Hoffman and Gelman, Algorithm 4).
#[must_use]
pub fn find_reasonable_step_size(
    log_posterior: &LogPosterior,
    start: &PhasePoint,
    inv_mass: [f64; 2],
) -> f64 {
    let mut state = *start;
    state.momentum = [1.0, 1.0];
    let h0 = state.hamiltonian(inv_mass);

    let acceptance = |step: f64| -> Option<f64> {
        let next = leapfrog(log_posterior, &state, step, inv_mass);
        let ratio = (h0 - next.hamiltonian(inv_mass)).exp();
        ratio.is_finite().then_some(ratio.min(1.0))
    };

    let mut step = 0.1;
    let initial = if let Some(accept) = acceptance(step) {
        accept
    } else {
        step = 1e-3;
        match acceptance(step) {
            Some(accept) => accept,
            None => return step,
        }
    };

    let grow = initial > 0.5;
    for _ in 0..50 {
        let candidate = if grow { step * 2.0 } else { step * 0.5 };
        if !(1e-10..=1e3).contains(&candidate) {
            break;
        }
        match acceptance(candidate) {
            Some(accept) if grow && accept < 0.5 => break,
            Some(accept) if !grow && accept > 0.5 => {
                step = candidate;
                break;
            }
            Some(_) => step = candidate,
            None => break,
        }
    }
    step.clamp(1e-8, 1e3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn dual_averaging_shrinks_step_when_acceptance_is_low() {
        let mut averaging = DualAveraging::new(0.8, 1.0);
        for _ in 0..200 {
            averaging.update(0.2);
        }
        assert!(averaging.adapted_step_size() < 1.0);
    }

    #[test]
    fn dual_averaging_grows_step_when_acceptance_is_high() {
        let mut averaging = DualAveraging::new(0.8, 0.01);
        for _ in 0..200 {
            averaging.update(1.0);
        }
        assert!(averaging.adapted_step_size() > 0.01);
    }

    #[test]
    fn welford_matches_two_pass_variance() {
        let points = [[1.0, 10.0], [2.0, 14.0], [4.0, 9.0], [7.0, 11.0]];
        let mut welford = WelfordVariance::default();
        for point in points {
            welford.update(point);
        }
        let n = 4.0;
        let mean0 = 3.5;
        let var0 = points.iter().map(|p| (p[0] - mean0).powi(2)).sum::<f64>() / (n - 1.0);
        let expected = (n / (n + 5.0)).mul_add(var0, 1e-3 * (5.0 / (n + 5.0)));
        let variance = welford.regularized_variance().expect("enough samples");
        assert_relative_eq!(variance[0], expected, epsilon = 1e-12);
        assert_eq!(welford.count(), 4);
        welford.reset();
        assert!(welford.regularized_variance().is_none());
    }

    #[test]
    fn windows_cover_warmup_contiguously() {
        for warmup in [10, 49, 50, 150, 1_000, 2_345] {
            let windows = compute_windows(warmup);
            assert_eq!(windows.first().map(|w| w.0), Some(0));
            assert_eq!(windows.last().map(|w| w.1), Some(warmup));
            for pair in windows.windows(2) {
                assert_eq!(pair[0].1, pair[1].0);
            }
        }
    }

    #[test]
    fn default_warmup_uses_stan_schedule() {
        assert_eq!(
            compute_windows(1_000),
            vec![
                (0, 75),
                (75, 100),
                (100, 150),
                (150, 250),
                (250, 450),
                (450, 950),
                (950, 1_000)
            ]
        );
    }

    #[test]
    fn short_warmup_adapts_step_only() {
        assert_eq!(compute_windows(20), vec![(0, 20)]);
    }
}
