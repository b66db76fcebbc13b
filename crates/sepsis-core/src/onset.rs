//! Presumed infection onset detection (Sepsis-3).
//!
//! An infection is suspected when an antibiotic and a culture fall close
//! together within the same ICU stay:
//! - antibiotic up to 24h before the culture: onset is the antibiotic time
//! - antibiotic up to 72h after the culture: onset is the culture time
//!
//! Each antibiotic is only tested against its nearest culture in the stay.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ClinicalEvent;
use crate::join::{TieBreak, join_and_select};
use crate::types::{StayId, SubjectId, ValidationError};

/// Which branch of the causal window produced an onset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetRule {
    /// Antibiotic at or before the culture; onset is the antibiotic time.
    AntibioticFirst,
    /// Antibiotic at or after the culture; onset is the culture time.
    CultureFirst,
}

/// How the per-stay onset is chosen when several antibiotics qualify.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetSelection {
    /// The qualifying antibiotic that comes first in input order, whatever its
    /// onset time.
    #[default]
    FirstAntibiotic,
    /// The chronologically earliest onset; equal onsets keep input order.
    EarliestOnset,
}

impl OnsetSelection {
    /// String representation used in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FirstAntibiotic => "first_antibiotic",
            Self::EarliestOnset => "earliest_onset",
        }
    }
}

impl fmt::Display for OnsetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OnsetSelection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_antibiotic" => Ok(Self::FirstAntibiotic),
            "earliest_onset" => Ok(Self::EarliestOnset),
            _ => Err(ValidationError::InvalidOnsetSelection {
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for onset detection.
#[derive(Debug, Clone)]
pub struct OnsetConfig {
    /// Longest gap for an antibiotic given before its culture. Default: 24 hours.
    pub max_abx_before_culture: Duration,

    /// Longest gap for an antibiotic given after its culture. Default: 72 hours.
    pub max_abx_after_culture: Duration,

    pub selection: OnsetSelection,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            max_abx_before_culture: Duration::hours(24),
            max_abx_after_culture: Duration::hours(72),
            selection: OnsetSelection::FirstAntibiotic,
        }
    }
}

/// The presumed infection onset for one stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnsetRecord {
    /// Subject of the matched culture.
    pub subject: Option<SubjectId>,
    pub stay_id: StayId,
    pub onset_time: DateTime<Utc>,
    pub rule: OnsetRule,
    /// Input position of the antibiotic that produced this onset.
    pub antibiotic_sequence: usize,
    pub antibiotic_time: DateTime<Utc>,
    pub culture_time: DateTime<Utc>,
}

impl OnsetRecord {
    /// Absolute antibiotic/culture gap in hours.
    #[expect(
        clippy::cast_precision_loss,
        reason = "millisecond gaps are far below f64's exact integer range"
    )]
    pub fn gap_hours(&self) -> f64 {
        (self.antibiotic_time - self.culture_time)
            .num_milliseconds()
            .abs() as f64
            / 3_600_000.0
    }
}

/// Applies the two-branch causal test to one antibiotic/culture pair.
///
/// The antibiotic-first branch is checked first, so simultaneous timestamps
/// resolve to the antibiotic time.
pub fn classify_pair(
    antibiotic_time: DateTime<Utc>,
    culture_time: DateTime<Utc>,
    config: &OnsetConfig,
) -> Option<(OnsetRule, DateTime<Utc>)> {
    let gap = (antibiotic_time - culture_time).abs();
    if antibiotic_time <= culture_time && gap <= config.max_abx_before_culture {
        Some((OnsetRule::AntibioticFirst, antibiotic_time))
    } else if antibiotic_time >= culture_time && gap <= config.max_abx_after_culture {
        Some((OnsetRule::CultureFirst, culture_time))
    } else {
        None
    }
}

/// Computes at most one presumed onset per stay.
///
/// # Algorithm
///
/// 1. Join antibiotics to cultures on stay (events without a stay are ignored)
/// 2. Pair each antibiotic with its nearest culture; equal gaps keep the
///    culture that comes first in input order
/// 3. Classify the pair with [`classify_pair`]
/// 4. Reduce qualifying antibiotics to one per stay using
///    [`OnsetConfig::selection`]
///
/// Records are returned in input order of the antibiotic that produced them.
pub fn detect_onsets(
    antibiotics: &[ClinicalEvent],
    cultures: &[ClinicalEvent],
    config: &OnsetConfig,
) -> Vec<OnsetRecord> {
    let nearest = join_and_select(
        antibiotics,
        cultures,
        stay_key,
        stay_key,
        |_, _| true,
        TieBreak::Nearest,
        |abx, culture| (abx.reference_time - culture.reference_time).abs(),
    );
    let paired = nearest.len();

    let mut per_stay: HashMap<&str, OnsetRecord> = HashMap::new();
    for selection in nearest {
        let (abx, culture) = (selection.left, selection.right);
        let Some((rule, onset_time)) =
            classify_pair(abx.reference_time, culture.reference_time, config)
        else {
            continue;
        };
        // Both sides of a join match carry the stay they were joined on.
        let Some(stay_id) = abx.stay_id.as_ref() else {
            continue;
        };

        let candidate = OnsetRecord {
            subject: culture.subject.clone(),
            stay_id: stay_id.clone(),
            onset_time,
            rule,
            antibiotic_sequence: abx.sequence,
            antibiotic_time: abx.reference_time,
            culture_time: culture.reference_time,
        };

        let keep_current = per_stay
            .get(stay_id.as_str())
            .is_some_and(|current| !replaces(&candidate, current, config.selection));
        if !keep_current {
            per_stay.insert(stay_id.as_str(), candidate);
        }
    }

    let mut onsets: Vec<OnsetRecord> = per_stay.into_values().collect();
    onsets.sort_by(|a, b| {
        a.antibiotic_sequence
            .cmp(&b.antibiotic_sequence)
            .then_with(|| a.stay_id.as_str().cmp(b.stay_id.as_str()))
    });

    tracing::info!(
        antibiotics = antibiotics.len(),
        cultures = cultures.len(),
        paired,
        onsets = onsets.len(),
        selection = %config.selection,
        "onset detection complete"
    );

    onsets
}

fn stay_key(event: &ClinicalEvent) -> Option<&str> {
    event.stay_id.as_ref().map(StayId::as_str)
}

/// Whether `candidate` should replace `current` as the onset for its stay.
fn replaces(candidate: &OnsetRecord, current: &OnsetRecord, selection: OnsetSelection) -> bool {
    let order = |o: &OnsetRecord| match selection {
        OnsetSelection::FirstAntibiotic => (None, o.antibiotic_sequence),
        OnsetSelection::EarliestOnset => (Some(o.onset_time), o.antibiotic_sequence),
    };
    order(candidate) < order(current)
}
