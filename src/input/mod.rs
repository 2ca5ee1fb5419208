//! # Model inputs
//!
//! Group summaries collected from the host and their expansion into
//! per-subject binary-outcome records.
//!
//! # Examples
//!
//! ```
//! use workload_risk::{GroupSummary, build_observations};
//!
//! let low = GroupSummary::new(4, 1, 75.0);
//! let high = GroupSummary::new(3, 2, 95.0);
//! let observations = build_observations(low, high).expect("counts are valid");
//!
//! assert_eq!(observations.len(), 7);
//! assert_eq!(observations.iter().filter(|obs| obs.outcome).count(), 3);
//! ```
//!
//! ```
//! use workload_risk::{GroupSummary, build_observations};
//!
//! let low = GroupSummary::new(100, 150, 75.0);
//! let high = GroupSummary::new(100, 30, 95.0);
//!
//! assert!(build_observations(low, high).is_err());
//! ```

use std::fmt;

use thiserror::Error;

/// Which of the two summary groups a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadGroup {
    Low,
    High,
}

impl fmt::Display for WorkloadGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::High => f.write_str("high"),
        }
    }
}

/// Count constraint that a group summary violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountBound {
    /// `subject_count` must be at least one.
    SubjectsPositive,
    /// `injured_count` must not exceed `subject_count`.
    InjuredAtMostSubjects,
}

impl fmt::Display for CountBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubjectsPositive => f.write_str("subject count must be positive"),
            Self::InjuredAtMostSubjects => {
                f.write_str("injured count must not exceed subject count")
            }
        }
    }
}

/// Errors returned when validating group summaries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error(
        "invalid counts for {group} workload group ({bound}): {injured} injured of {subjects} subjects"
    )]
    InvalidGroupCounts {
        group: WorkloadGroup,
        bound: CountBound,
        subjects: usize,
        injured: usize,
    },
    #[error("workload level for {group} group must be finite")]
    NonFiniteWorkload { group: WorkloadGroup },
}

/// Summary counts for one workload group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSummary {
    pub subject_count: usize,
    pub injured_count: usize,
    pub workload_level: f64,
}

impl GroupSummary {
    #[must_use]
    pub const fn new(subject_count: usize, injured_count: usize, workload_level: f64) -> Self {
        Self {
            subject_count,
            injured_count,
            workload_level,
        }
    }

    /// # Errors
    ///
    /// Returns `InputError` naming `group` if counts or workload are invalid.
    pub fn validate(self, group: WorkloadGroup) -> Result<(), InputError> {
        if self.subject_count == 0 {
            return Err(self.count_error(group, CountBound::SubjectsPositive));
        }
        if self.injured_count > self.subject_count {
            return Err(self.count_error(group, CountBound::InjuredAtMostSubjects));
        }
        if !self.workload_level.is_finite() {
            return Err(InputError::NonFiniteWorkload { group });
        }
        Ok(())
    }

    #[must_use]
    pub const fn uninjured_count(self) -> usize {
        self.subject_count.saturating_sub(self.injured_count)
    }

    const fn count_error(self, group: WorkloadGroup, bound: CountBound) -> InputError {
        InputError::InvalidGroupCounts {
            group,
            bound,
            subjects: self.subject_count,
            injured: self.injured_count,
        }
    }
}

/// One subject: injury outcome and workload covariate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub outcome: bool,
    pub workload: f64,
}

/// Observations sharing one workload value, collapsed to counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadCell {
    pub workload: f64,
    pub subjects: usize,
    pub events: usize,
}

/// Expand two group summaries into per-subject observations.
///
/// Output order is deterministic: low-group injuries, low-group non-injuries,
/// then the same for the high group.
///
/// # Errors
///
/// Returns `InputError::InvalidGroupCounts` naming the offending group and bound.
pub fn build_observations(
    low: GroupSummary,
    high: GroupSummary,
) -> Result<Vec<Observation>, InputError> {
    low.validate(WorkloadGroup::Low)?;
    high.validate(WorkloadGroup::High)?;

    let mut observations = Vec::with_capacity(low.subject_count + high.subject_count);
    for group in [low, high] {
        expand_group(group, &mut observations);
    }
    Ok(observations)
}

fn expand_group(group: GroupSummary, out: &mut Vec<Observation>) {
    let injured = Observation {
        outcome: true,
        workload: group.workload_level,
    };
    let uninjured = Observation {
        outcome: false,
        workload: group.workload_level,
    };
    out.extend(std::iter::repeat_n(injured, group.injured_count));
    out.extend(std::iter::repeat_n(uninjured, group.uninjured_count()));
}

/// Collapse observations into cells of identical workload, ordered by workload.
#[must_use]
pub fn workload_cells(observations: &[Observation]) -> Vec<WorkloadCell> {
    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| a.workload.total_cmp(&b.workload));

    let mut cells: Vec<WorkloadCell> = Vec::new();
    for observation in sorted {
        match cells.last_mut() {
            Some(cell) if cell.workload.total_cmp(&observation.workload).is_eq() => {
                cell.subjects += 1;
                cell.events += usize::from(observation.outcome);
            }
            _ => cells.push(WorkloadCell {
                workload: observation.workload,
                subjects: 1,
                events: usize::from(observation.outcome),
            }),
        }
    }
    cells
}
