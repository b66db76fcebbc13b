//! Hospital admissions: duplicate removal and 30-day readmission flags.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SubjectId;

/// The parts of a demographics row that admission processing looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub subject: SubjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admit_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_time: Option<DateTime<Utc>>,
}

/// Readmission status of one admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readmission {
    /// Position of the admission in the input.
    pub index: usize,
    /// Admitted within the cutoff of the subject's previous discharge.
    pub readmitted: bool,
}

/// Returns the positions of the admissions to keep, dropping every admission
/// whose (admit, discharge) pair was already seen.
///
/// Missing times compare equal to each other.
pub fn dedup_admissions(admissions: &[Admission]) -> Vec<usize> {
    let mut seen = HashSet::new();
    admissions
        .iter()
        .enumerate()
        .filter(|(_, a)| seen.insert((a.admit_time, a.discharge_time)))
        .map(|(index, _)| index)
        .collect()
}

/// Flags admissions that start within `cutoff` of the same subject's previous
/// discharge.
///
/// The result is ordered by subject, then admit time (missing admit times
/// last), keeping input order for ties. An admission with no previous
/// admission, or with a missing time on either side, is not a readmission.
pub fn flag_readmissions(admissions: &[Admission], cutoff: Duration) -> Vec<Readmission> {
    let mut order: Vec<usize> = (0..admissions.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&admissions[a], &admissions[b]);
        a.subject
            .sort_key()
            .cmp(&b.subject.sort_key())
            .then_with(|| a.admit_time.is_none().cmp(&b.admit_time.is_none()))
            .then_with(|| a.admit_time.cmp(&b.admit_time))
    });

    let mut flags = Vec::with_capacity(order.len());
    let mut previous: Option<&Admission> = None;
    for index in order {
        let current = &admissions[index];
        let readmitted = previous
            .filter(|p| p.subject == current.subject)
            .and_then(|p| Some(current.admit_time? - p.discharge_time?))
            .is_some_and(|gap| gap <= cutoff);
        flags.push(Readmission { index, readmitted });
        previous = Some(current);
    }

    tracing::debug!(
        admissions = admissions.len(),
        readmissions = flags.iter().filter(|f| f.readmitted).count(),
        "readmission flags computed"
    );
    flags
}
