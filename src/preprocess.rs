use std::fmt;

use crate::input::{GroupSummary, Observation, WorkloadGroup, workload_cells};

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeDiagnostics {
    pub n_observations: usize,
    pub n_events: usize,
    pub n_non_events: usize,
    pub event_share: f64,
    pub distinct_workloads: usize,
}

#[must_use]
pub fn outcome_diagnostics(observations: &[Observation]) -> OutcomeDiagnostics {
    let n_observations = observations.len();
    let n_events = observations.iter().filter(|obs| obs.outcome).count();
    let event_share = if n_observations > 0 {
        usize_to_f64(n_events) / usize_to_f64(n_observations)
    } else {
        0.0
    };

    OutcomeDiagnostics {
        n_observations,
        n_events,
        n_non_events: n_observations - n_events,
        event_share,
        distinct_workloads: workload_cells(observations).len(),
    }
}

/// Whether both outcome values occur at least once.
#[must_use]
pub fn outcome_has_variation(observations: &[Observation]) -> bool {
    let diagnostics = outcome_diagnostics(observations);
    diagnostics.n_events > 0 && diagnostics.n_non_events > 0
}

/// Data situations in which the fit still runs but leans heavily on the priors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReliabilityWarning {
    /// A group recorded no injuries; its risk is bounded only from above.
    NoEventsInGroup { group: WorkloadGroup },
    /// Every subject in a group was injured.
    AllEventsInGroup { group: WorkloadGroup },
    /// Both groups share one workload, so the data carry no slope information.
    IdenticalWorkloads { workload: f64 },
    /// A risk-difference workload lies outside the observed workload range.
    ContrastOutsideObservedRange { workload: f64, min: f64, max: f64 },
}

impl fmt::Display for ReliabilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEventsInGroup { group } => {
                write!(f, "{group} workload group has no recorded injuries")
            }
            Self::AllEventsInGroup { group } => {
                write!(f, "every subject in the {group} workload group was injured")
            }
            Self::IdenticalWorkloads { workload } => write!(
                f,
                "both groups share workload {workload}; slope is informed by its prior only"
            ),
            Self::ContrastOutsideObservedRange { workload, min, max } => write!(
                f,
                "contrast workload {workload} lies outside the observed range [{min}, {max}]"
            ),
        }
    }
}

/// Collect non-fatal reliability warnings for a pair of groups and the two
/// workloads used for the risk difference. Each warning is also logged.
#[must_use]
pub fn reliability_warnings(
    low: GroupSummary,
    high: GroupSummary,
    contrast_workloads: [f64; 2],
) -> Vec<ReliabilityWarning> {
    let mut warnings = Vec::new();

    for (group, summary) in [(WorkloadGroup::Low, low), (WorkloadGroup::High, high)] {
        if summary.injured_count == 0 {
            warnings.push(ReliabilityWarning::NoEventsInGroup { group });
        } else if summary.injured_count == summary.subject_count {
            warnings.push(ReliabilityWarning::AllEventsInGroup { group });
        }
    }

    if low.workload_level.total_cmp(&high.workload_level).is_eq() {
        warnings.push(ReliabilityWarning::IdenticalWorkloads {
            workload: low.workload_level,
        });
    }

    let min = low.workload_level.min(high.workload_level);
    let max = low.workload_level.max(high.workload_level);
    for workload in contrast_workloads {
        if workload < min || workload > max {
            warnings.push(ReliabilityWarning::ContrastOutsideObservedRange { workload, min, max });
        }
    }

    for warning in &warnings {
        log::warn!("{warning}");
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::build_observations;

    #[test]
    fn outcome_diagnostics_counts_values() {
        let observations =
            build_observations(GroupSummary::new(10, 2, 70.0), GroupSummary::new(10, 3, 90.0))
                .expect("counts are valid");
        let diag = outcome_diagnostics(&observations);
        assert_eq!(diag.n_observations, 20);
        assert_eq!(diag.n_events, 5);
        assert_eq!(diag.n_non_events, 15);
        assert_eq!(diag.distinct_workloads, 2);
        assert!((diag.event_share - 0.25).abs() < 1e-12);
    }

    #[test]
    fn variation_requires_both_outcomes() {
        let none =
            build_observations(GroupSummary::new(5, 0, 70.0), GroupSummary::new(5, 0, 90.0))
                .expect("counts are valid");
        let all =
            build_observations(GroupSummary::new(5, 5, 70.0), GroupSummary::new(5, 5, 90.0))
                .expect("counts are valid");
        let mixed =
            build_observations(GroupSummary::new(5, 0, 70.0), GroupSummary::new(5, 1, 90.0))
                .expect("counts are valid");
        assert!(!outcome_has_variation(&none));
        assert!(!outcome_has_variation(&all));
        assert!(outcome_has_variation(&mixed));
        assert!(!outcome_has_variation(&[]));
    }

    #[test]
    fn warnings_flag_sparse_groups_and_extrapolated_contrasts() {
        let warnings = reliability_warnings(
            GroupSummary::new(20, 0, 75.0),
            GroupSummary::new(20, 20, 95.0),
            [70.0, 95.0],
        );
        assert_eq!(
            warnings,
            vec![
                ReliabilityWarning::NoEventsInGroup {
                    group: WorkloadGroup::Low
                },
                ReliabilityWarning::AllEventsInGroup {
                    group: WorkloadGroup::High
                },
                ReliabilityWarning::ContrastOutsideObservedRange {
                    workload: 70.0,
                    min: 75.0,
                    max: 95.0
                },
            ]
        );
    }

    #[test]
    fn warnings_are_empty_for_typical_inputs() {
        let warnings = reliability_warnings(
            GroupSummary::new(100, 15, 75.0),
            GroupSummary::new(100, 30, 95.0),
            [75.0, 95.0],
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn identical_workloads_are_flagged() {
        let warnings = reliability_warnings(
            GroupSummary::new(10, 2, 80.0),
            GroupSummary::new(10, 4, 80.0),
            [80.0, 80.0],
        );
        assert!(warnings.contains(&ReliabilityWarning::IdenticalWorkloads { workload: 80.0 }));
    }
}
