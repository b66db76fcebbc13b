//! Stay resolution.
//!
//! Assigns an ICU stay to events that arrive without one, using only the
//! event's join key and timestamp:
//! 1. Stays are partitioned by the join key (subject for cultures, encounter
//!    for antibiotics)
//! 2. A stay is a valid candidate when the event falls within the stay's
//!    interval widened by the window on both sides, or when it is the only
//!    stay for that key
//! 3. Several valid candidates are reduced with the configured [`TieBreak`]

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use serde::Serialize;

use crate::event::{ClinicalEvent, JoinKey, StayInterval};
use crate::join::{TieBreak, join_and_select};
use crate::types::StayId;

/// Configuration for stay resolution.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How far outside a stay an event may fall and still match it.
    /// Default: 48 hours.
    pub window: Duration,

    /// Policy for events that match more than one stay. Default: last candidate
    /// in stay-table order.
    pub tie_break: TieBreak,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            window: Duration::hours(48),
            tie_break: TieBreak::Last,
        }
    }
}

/// Counts describing one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionStats {
    /// Events in the input.
    pub total: usize,
    /// Events that already carried a stay and passed through.
    pub already_assigned: usize,
    /// Events that received a stay in this pass.
    pub resolved: usize,
    /// Resolved events that had more than one valid candidate.
    pub ambiguous: usize,
    /// Events left without a stay.
    pub unresolved: usize,
}

/// Result of stay resolution.
#[derive(Debug)]
pub struct Resolution {
    /// All input events in input order, with stays filled in where resolved.
    pub events: Vec<ClinicalEvent>,
    pub stats: ResolutionStats,
}

/// Resolves missing stay identifiers for `events`.
///
/// Events that already have a stay are returned unchanged, which makes the
/// operation idempotent. Events without a value for `key`, or without any
/// valid candidate, keep `stay_id = None`.
pub fn resolve_stays(
    events: &[ClinicalEvent],
    stays: &[StayInterval],
    key: JoinKey,
    config: &ResolverConfig,
) -> Resolution {
    let stays_per_key = count_stays_per_key(stays, key);

    let pending: Vec<(usize, &ClinicalEvent)> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.stay_id.is_none())
        .collect();

    let window = config.window;
    let selections = join_and_select(
        &pending,
        stays,
        |(_, e)| e.key(key),
        |s| Some(s.key(key)),
        |(_, e), s| {
            s.contains_within(e.reference_time, window)
                || stays_per_key.get(s.key(key)).copied() == Some(1)
        },
        config.tie_break,
        |(_, e), s| s.distance_to(e.reference_time),
    );

    let mut stats = ResolutionStats {
        total: events.len(),
        already_assigned: events.len() - pending.len(),
        ..ResolutionStats::default()
    };

    let mut assigned: HashMap<usize, &StayId> = HashMap::with_capacity(selections.len());
    for selection in &selections {
        let (position, event) = *selection.left;
        if selection.candidate_count > 1 {
            stats.ambiguous += 1;
            tracing::debug!(
                event_id = %event.id,
                candidates = selection.candidate_count,
                chosen = %selection.right.stay_id,
                tie_break = %config.tie_break,
                "event matched several stays"
            );
        }
        assigned.insert(position, &selection.right.stay_id);
    }
    stats.resolved = assigned.len();
    stats.unresolved = pending.len() - stats.resolved;

    let events = events
        .iter()
        .enumerate()
        .map(|(position, event)| {
            let mut event = event.clone();
            if let Some(stay_id) = assigned.get(&position) {
                event.stay_id = Some((*stay_id).clone());
            }
            event
        })
        .collect();

    tracing::info!(
        ?key,
        total = stats.total,
        already_assigned = stats.already_assigned,
        resolved = stats.resolved,
        ambiguous = stats.ambiguous,
        unresolved = stats.unresolved,
        "stay resolution complete"
    );

    Resolution { events, stats }
}

/// Number of distinct stays sharing each key value.
fn count_stays_per_key(stays: &[StayInterval], key: JoinKey) -> HashMap<&str, usize> {
    let mut distinct: HashMap<&str, HashSet<&StayId>> = HashMap::new();
    for stay in stays {
        if stay.end_time < stay.start_time {
            tracing::warn!(
                stay_id = %stay.stay_id,
                start = %stay.start_time,
                end = %stay.end_time,
                "stay ends before it starts"
            );
        }
        distinct
            .entry(stay.key(key))
            .or_default()
            .insert(&stay.stay_id);
    }
    distinct
        .into_iter()
        .map(|(value, ids)| (value, ids.len()))
        .collect()
}
