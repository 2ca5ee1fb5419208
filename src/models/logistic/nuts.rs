//! Multinomial No-U-Turn transitions on a diagonal Euclidean metric.

use rand::RngExt;
use rand::rngs::StdRng;

use crate::utils::{sample_standard_normal, usize_to_f64};

use super::likelihood::LogPosterior;

/// Energy error above which a trajectory is flagged divergent.
const DIVERGENCE_THRESHOLD: f64 = 1000.0;

/// Position, momentum, and cached log density/gradient at one point of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePoint {
    pub position: [f64; 2],
    pub momentum: [f64; 2],
    pub log_density: f64,
    pub gradient: [f64; 2],
}

impl PhasePoint {
    /// Point at `position` with zero momentum.
    #[must_use]
    pub fn at(log_posterior: &LogPosterior, position: [f64; 2]) -> Self {
        Self {
            position,
            momentum: [0.0; 2],
            log_density: log_posterior.log_density(position),
            gradient: log_posterior.gradient(position),
        }
    }

    #[must_use]
    pub fn kinetic_energy(&self, inv_mass: [f64; 2]) -> f64 {
        0.5 * (0..2)
            .map(|index| self.momentum[index] * self.momentum[index] * inv_mass[index])
            .sum::<f64>()
    }

    /// Potential (negative log density) plus kinetic energy.
    #[must_use]
    pub fn hamiltonian(&self, inv_mass: [f64; 2]) -> f64 {
        self.kinetic_energy(inv_mass) - self.log_density
    }
}

/// One leapfrog step of size `step` (negative to integrate backwards).
#[must_use]
pub fn leapfrog(
    log_posterior: &LogPosterior,
    point: &PhasePoint,
    step: f64,
    inv_mass: [f64; 2],
) -> PhasePoint {
    let half = 0.5 * step;
    let mut momentum = point.momentum;
    let mut position = point.position;
    for index in 0..2 {
        momentum[index] = half.mul_add(point.gradient[index], momentum[index]);
        position[index] = (step * inv_mass[index]).mul_add(momentum[index], position[index]);
    }
    let mut next = PhasePoint::at(log_posterior, position);
    for index in 0..2 {
        momentum[index] = half.mul_add(next.gradient[index], momentum[index]);
    }
    next.momentum = momentum;
    next
}

/// Outcome of one NUTS transition.
#[derive(Debug, Clone, Copy)]
pub struct NutsTransition {
    /// Selected point; its momentum is meaningless.
    pub point: PhasePoint,
    /// Number of trajectory doublings.
    pub depth: usize,
    pub divergent: bool,
    /// Mean Metropolis acceptance statistic over the trajectory.
    pub accept_prob: f64,
    pub n_leapfrog: usize,
}

struct TreeContext<'a> {
    log_posterior: &'a LogPosterior,
    step_size: f64,
    inv_mass: [f64; 2],
    initial_energy: f64,
}

struct Subtree {
    left: PhasePoint,
    right: PhasePoint,
    proposal: PhasePoint,
    log_sum_weight: f64,
    n_leapfrog: usize,
    sum_accept_prob: f64,
    divergent: bool,
    turning: bool,
}

fn is_turning(left: &PhasePoint, right: &PhasePoint, inv_mass: [f64; 2]) -> bool {
    let mut dot_left = 0.0;
    let mut dot_right = 0.0;
    for index in 0..2 {
        let dq = right.position[index] - left.position[index];
        dot_left += dq * left.momentum[index] * inv_mass[index];
        dot_right += dq * right.momentum[index] * inv_mass[index];
    }
    dot_left < 0.0 || dot_right < 0.0
}

fn log_sum_exp(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        max + ((a - max).exp() + (b - max).exp()).ln()
    }
}

fn build_leaf(context: &TreeContext<'_>, edge: &PhasePoint, direction: f64) -> Subtree {
    let next = leapfrog(
        context.log_posterior,
        edge,
        direction * context.step_size,
        context.inv_mass,
    );
    let energy_error = next.hamiltonian(context.inv_mass) - context.initial_energy;
    let divergent = !energy_error.is_finite() || energy_error > DIVERGENCE_THRESHOLD;
    let (log_weight, accept_prob) = if energy_error.is_finite() {
        (-energy_error, (-energy_error).exp().min(1.0))
    } else {
        (f64::NEG_INFINITY, 0.0)
    };

    Subtree {
        left: next,
        right: next,
        proposal: next,
        log_sum_weight: log_weight,
        n_leapfrog: 1,
        sum_accept_prob: accept_prob,
        divergent,
        turning: false,
    }
}

fn build_tree(
    context: &TreeContext<'_>,
    edge: &PhasePoint,
    depth: usize,
    direction: f64,
    rng: &mut StdRng,
) -> Subtree {
    if depth == 0 {
        return build_leaf(context, edge, direction);
    }

    let mut inner = build_tree(context, edge, depth - 1, direction, rng);
    if inner.divergent || inner.turning {
        return inner;
    }

    let outer_edge = if direction > 0.0 { inner.right } else { inner.left };
    let outer = build_tree(context, &outer_edge, depth - 1, direction, rng);

    inner.n_leapfrog += outer.n_leapfrog;
    inner.sum_accept_prob += outer.sum_accept_prob;
    if outer.divergent || outer.turning {
        inner.divergent |= outer.divergent;
        inner.turning = true;
        return inner;
    }

    let combined = log_sum_exp(inner.log_sum_weight, outer.log_sum_weight);
    if rng.random::<f64>() < (outer.log_sum_weight - combined).exp() {
        inner.proposal = outer.proposal;
    }
    inner.log_sum_weight = combined;
    if direction > 0.0 {
        inner.right = outer.right;
    } else {
        inner.left = outer.left;
    }
    inner.turning = is_turning(&inner.left, &inner.right, context.inv_mass);
    inner
}

/// Run one NUTS transition from `current`, resampling the momentum from `N(0, M)`
/// where `M` is the inverse of `inv_mass`.
pub fn nuts_transition(
    log_posterior: &LogPosterior,
    current: &PhasePoint,
    step_size: f64,
    inv_mass: [f64; 2],
    max_tree_depth: usize,
    rng: &mut StdRng,
) -> NutsTransition {
    let mut start = *current;
    for index in 0..2 {
        start.momentum[index] = sample_standard_normal(rng) / inv_mass[index].sqrt();
    }

    let context = TreeContext {
        log_posterior,
        step_size,
        inv_mass,
        initial_energy: start.hamiltonian(inv_mass),
    };

    let mut left = start;
    let mut right = start;
    let mut proposal = start;
    let mut log_sum_weight = 0.0;
    let mut n_leapfrog = 0;
    let mut sum_accept_prob = 0.0;
    let mut divergent = false;
    let mut depth = 0;

    while depth < max_tree_depth {
        let direction = if rng.random::<bool>() { 1.0 } else { -1.0 };
        let edge = if direction > 0.0 { right } else { left };
        let subtree = build_tree(&context, &edge, depth, direction, rng);
        depth += 1;
        n_leapfrog += subtree.n_leapfrog;
        sum_accept_prob += subtree.sum_accept_prob;

        if subtree.divergent {
            divergent = true;
            break;
        }
        if subtree.turning {
            break;
        }

        // Biased progressive sampling favours the newer subtree.
        if rng.random::<f64>() < (subtree.log_sum_weight - log_sum_weight).exp() {
            proposal = subtree.proposal;
        }
        log_sum_weight = log_sum_exp(log_sum_weight, subtree.log_sum_weight);
        if direction > 0.0 {
            right = subtree.right;
        } else {
            left = subtree.left;
        }
        if is_turning(&left, &right, inv_mass) {
            break;
        }
    }

    NutsTransition {
        point: proposal,
        depth,
        divergent,
        accept_prob: sum_accept_prob / usize_to_f64(n_leapfrog.max(1)),
        n_leapfrog,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

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
    fn leapfrog_is_reversible() {
        let posterior = scenario_posterior();
        let inv_mass = [0.03, 3e-4];
        let mut start = PhasePoint::at(&posterior, [-1.2, 0.04]);
        start.momentum = [1.5, -20.0];
        let forward = leapfrog(&posterior, &start, 0.2, inv_mass);
        let back = leapfrog(&posterior, &forward, -0.2, inv_mass);
        assert_relative_eq!(back.position[0], start.position[0], epsilon = 1e-10);
        assert_relative_eq!(back.position[1], start.position[1], epsilon = 1e-10);
        assert_relative_eq!(back.momentum[1], start.momentum[1], epsilon = 1e-8);
    }

    #[test]
    fn small_steps_nearly_conserve_energy() {
        let posterior = scenario_posterior();
        let inv_mass = [0.03, 3e-4];
        let mut point = PhasePoint::at(&posterior, [-1.0, 0.02]);
        point.momentum = [2.0, 30.0];
        let initial = point.hamiltonian(inv_mass);
        for _ in 0..20 {
            point = leapfrog(&posterior, &point, 0.01, inv_mass);
        }
        assert!((point.hamiltonian(inv_mass) - initial).abs() < 1e-3);
    }

    #[test]
    fn transitions_are_finite_and_bounded_by_depth() {
        let posterior = scenario_posterior();
        let mut rng = StdRng::seed_from_u64(3);
        let mut point = PhasePoint::at(&posterior, [-1.2, 0.04]);
        for _ in 0..50 {
            let transition = nuts_transition(&posterior, &point, 0.5, [0.03, 3e-4], 6, &mut rng);
            assert!(transition.depth <= 6);
            assert!((0.0..=1.0).contains(&transition.accept_prob));
            assert!(transition.point.log_density.is_finite());
            point = transition.point;
        }
    }

    #[test]
    fn huge_steps_are_flagged_divergent() {
        let posterior = scenario_posterior();
        let mut rng = StdRng::seed_from_u64(9);
        let point = PhasePoint::at(&posterior, [-1.2, 0.04]);
        let transition = nuts_transition(&posterior, &point, 500.0, [1.0, 1.0], 4, &mut rng);
        assert!(transition.divergent);
        assert_eq!(transition.point.position, point.position);
    }
}
