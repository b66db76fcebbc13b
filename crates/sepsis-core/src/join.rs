//! Keyed join-and-filter shared by stay resolution and onset detection.
//!
//! Both callers do the same thing: equi-join two row sets on a key, drop pairs
//! that fail a predicate, then reduce each left row's surviving candidates to a
//! single right row. Keeping the join and the reduction here means ordering and
//! tie-break behavior cannot drift between the two call sites.
//!
//! # Ordering
//!
//! Matches come out in left-input order, and for each left row in right-input
//! order. Every match is local to one key, so the same output can be produced
//! partition by partition when the inputs do not fit in memory.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// A left/right pair that shares a key and passed the filter.
#[derive(Debug)]
pub struct Match<'a, L, R> {
    /// Position of `left` in the left input.
    pub left_index: usize,
    pub left: &'a L,
    pub right: &'a R,
}

impl<L, R> Clone for Match<'_, L, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L, R> Copy for Match<'_, L, R> {}

/// All surviving right rows for one left row, in right-input order.
#[derive(Debug)]
pub struct Candidates<'a, L, R> {
    pub left_index: usize,
    pub left: &'a L,
    pub rights: Vec<&'a R>,
}

/// The right row picked for a left row, with how many it was picked from.
#[derive(Debug)]
pub struct Selection<'a, L, R> {
    pub left_index: usize,
    pub left: &'a L,
    pub right: &'a R,
    pub candidate_count: usize,
}

/// How to pick one right row when several survive the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Keep the last candidate in join order. This reproduces an
    /// overwrite-by-index assignment and is the compatibility default.
    #[default]
    Last,
    /// Keep the first candidate in join order.
    First,
    /// Keep the candidate with the smallest distance; equal distances keep the
    /// first one encountered.
    Nearest,
}

impl TieBreak {
    /// String representation used in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Last => "last",
            Self::First => "first",
            Self::Nearest => "nearest",
        }
    }

    /// Picks one of `candidates`.
    ///
    /// `distance` is only consulted by [`TieBreak::Nearest`].
    pub fn choose<'a, R, D, F>(self, candidates: &[&'a R], distance: F) -> Option<&'a R>
    where
        D: Ord,
        F: Fn(&R) -> D,
    {
        match self {
            Self::Last => candidates.last().copied(),
            Self::First => candidates.first().copied(),
            Self::Nearest => {
                let mut best: Option<(&'a R, D)> = None;
                for &candidate in candidates {
                    let d = distance(candidate);
                    if best.as_ref().is_none_or(|(_, current)| d < *current) {
                        best = Some((candidate, d));
                    }
                }
                best.map(|(candidate, _)| candidate)
            }
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TieBreak {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last" => Ok(Self::Last),
            "first" => Ok(Self::First),
            "nearest" => Ok(Self::Nearest),
            _ => Err(ValidationError::InvalidTieBreak {
                value: s.to_string(),
            }),
        }
    }
}

/// Equi-joins `left` and `right` on the extracted keys and keeps the pairs
/// for which `predicate` holds.
///
/// Rows whose key extractor returns `None` never match.
pub fn join_and_filter<'a, L, R, K, FL, FR, P>(
    left: &'a [L],
    right: &'a [R],
    left_key: FL,
    right_key: FR,
    predicate: P,
) -> Vec<Match<'a, L, R>>
where
    K: Eq + Hash,
    FL: Fn(&'a L) -> Option<K>,
    FR: Fn(&'a R) -> Option<K>,
    P: Fn(&L, &R) -> bool,
{
    let mut partitions: HashMap<K, Vec<&'a R>> = HashMap::new();
    for row in right {
        if let Some(key) = right_key(row) {
            partitions.entry(key).or_default().push(row);
        }
    }

    let mut matches = Vec::new();
    for (left_index, row) in left.iter().enumerate() {
        let Some(partition) = left_key(row).and_then(|key| partitions.get(&key)) else {
            continue;
        };
        for &candidate in partition {
            if predicate(row, candidate) {
                matches.push(Match {
                    left_index,
                    left: row,
                    right: candidate,
                });
            }
        }
    }
    matches
}

/// Collects consecutive matches that share a left row.
pub fn group_by_left<'a, L, R>(matches: &[Match<'a, L, R>]) -> Vec<Candidates<'a, L, R>> {
    let mut groups: Vec<Candidates<'a, L, R>> = Vec::new();
    for m in matches {
        match groups.last_mut() {
            Some(group) if group.left_index == m.left_index => group.rights.push(m.right),
            _ => groups.push(Candidates {
                left_index: m.left_index,
                left: m.left,
                rights: vec![m.right],
            }),
        }
    }
    groups
}

/// Joins, filters and reduces each left row to one right row using `tie_break`.
///
/// Left rows with no surviving candidate are absent from the result.
pub fn join_and_select<'a, L, R, K, FL, FR, P, D, FD>(
    left: &'a [L],
    right: &'a [R],
    left_key: FL,
    right_key: FR,
    predicate: P,
    tie_break: TieBreak,
    distance: FD,
) -> Vec<Selection<'a, L, R>>
where
    K: Eq + Hash,
    FL: Fn(&'a L) -> Option<K>,
    FR: Fn(&'a R) -> Option<K>,
    P: Fn(&L, &R) -> bool,
    D: Ord,
    FD: Fn(&L, &R) -> D,
{
    let matches = join_and_filter(left, right, left_key, right_key, predicate);
    group_by_left(&matches)
        .into_iter()
        .filter_map(|group| {
            let left = group.left;
            tie_break
                .choose(&group.rights, |r| distance(left, r))
                .map(|right| Selection {
                    left_index: group.left_index,
                    left,
                    right,
                    candidate_count: group.rights.len(),
                })
        })
        .collect()
}
