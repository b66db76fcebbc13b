//! Core domain logic for Sepsis-3 onset preprocessing.
//!
//! This crate contains the fundamental types and logic for:
//! - Stay resolution: assigning ICU stays to events that arrive without one
//! - Onset detection: presumed infection onset from antibiotics and cultures
//! - Admissions: duplicate removal and 30-day readmission flags
//!
//! Nothing here performs I/O; tables are loaded and written by `sepsis-io`.

pub mod admission;
pub mod event;
pub mod join;
mod onset;
mod resolve;
pub mod types;

pub use admission::{Admission, Readmission, dedup_admissions, flag_readmissions};
pub use event::{ClinicalEvent, EventKind, JoinKey, StayInterval};
pub use join::TieBreak;
pub use onset::{
    OnsetConfig, OnsetRecord, OnsetRule, OnsetSelection, classify_pair, detect_onsets,
};
pub use resolve::{Resolution, ResolutionStats, ResolverConfig, resolve_stays};
pub use types::{EncounterId, EventId, StayId, SubjectId, ValidationError};
