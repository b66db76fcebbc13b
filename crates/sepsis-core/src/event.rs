//! Clinical events and ICU stay intervals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EncounterId, EventId, StayId, SubjectId};

/// The kind of clinical event, which decides both the meaning of
/// `reference_time` and the key used to look up candidate stays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A microbiology sample; `reference_time` is the chart time.
    Culture,
    /// An antibiotic administration; `reference_time` is the start time.
    Antibiotic,
}

impl EventKind {
    /// The key used to enumerate candidate stays for this kind of event.
    pub const fn join_key(self) -> JoinKey {
        match self {
            Self::Culture => JoinKey::Subject,
            Self::Antibiotic => JoinKey::Encounter,
        }
    }

    /// Lowercase plural name used in logs and reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Culture => "cultures",
            Self::Antibiotic => "antibiotics",
        }
    }
}

/// Which identifier links an event to its candidate stays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKey {
    /// Match on subject (patient) identifier.
    Subject,
    /// Match on hospital encounter identifier.
    Encounter,
}

/// One ICU stay.
///
/// `end_time >= start_time` is expected but not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayInterval {
    pub stay_id: StayId,
    pub subject: SubjectId,
    pub encounter: EncounterId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl StayInterval {
    /// Returns the identifier this stay is partitioned by for `key`.
    pub fn key(&self, key: JoinKey) -> &str {
        match key {
            JoinKey::Subject => self.subject.as_str(),
            JoinKey::Encounter => self.encounter.as_str(),
        }
    }

    /// Whether `time` lies in `[start - window, end + window]`.
    pub fn contains_within(&self, time: DateTime<Utc>, window: chrono::Duration) -> bool {
        time >= self.start_time - window && time <= self.end_time + window
    }

    /// Distance from `time` to the closest edge of the interval, zero inside.
    pub fn distance_to(&self, time: DateTime<Utc>) -> chrono::Duration {
        if time < self.start_time {
            self.start_time - time
        } else if time > self.end_time {
            time - self.end_time
        } else {
            chrono::Duration::zero()
        }
    }
}

/// A culture or antibiotic event.
///
/// `sequence` is the ingestion order of the event and is the only ordering
/// used for tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub sequence: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter: Option<EncounterId>,
    pub reference_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stay_id: Option<StayId>,
}

impl ClinicalEvent {
    /// Creates an unassigned event with no subject or encounter.
    pub const fn new(
        id: EventId,
        kind: EventKind,
        sequence: usize,
        reference_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            sequence,
            subject: None,
            encounter: None,
            reference_time,
            stay_id: None,
        }
    }

    /// Returns the event's value for `key`, if present.
    pub fn key(&self, key: JoinKey) -> Option<&str> {
        match key {
            JoinKey::Subject => self.subject.as_ref().map(SubjectId::as_str),
            JoinKey::Encounter => self.encounter.as_ref().map(EncounterId::as_str),
        }
    }
}
