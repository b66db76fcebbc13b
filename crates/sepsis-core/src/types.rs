//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A configured duration was negative or not a finite number.
    #[error("{field} must be a non-negative number of hours, got {value}")]
    InvalidHours { field: &'static str, value: f64 },

    /// Unknown tie-break policy name.
    #[error("invalid tie-break policy: {value}")]
    InvalidTieBreak { value: String },

    /// Unknown onset selection name.
    #[error("invalid onset selection: {value}")]
    InvalidOnsetSelection { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated clinical event identifier.
    ///
    /// Event IDs are assigned when a table is loaded and only need to be unique
    /// within one run.
    EventId, "event ID"
);

define_string_id!(
    /// A validated ICU stay identifier.
    StayId, "stay ID"
);

define_string_id!(
    /// A validated subject (patient) identifier.
    SubjectId, "subject ID"
);

define_string_id!(
    /// A validated hospital encounter (admission) identifier.
    EncounterId, "encounter ID"
);

impl SubjectId {
    /// Ordering key that sorts numeric identifiers by value. Non-numeric
    /// identifiers sort lexicographically ahead of all numeric ones.
    pub fn sort_key(&self) -> (Option<u64>, &str) {
        (self.0.parse().ok(), &self.0)
    }
}

/// Converts a configured number of hours to a [`chrono::Duration`].
///
/// Sub-millisecond fractions are rounded to the nearest millisecond.
pub fn hours(field: &'static str, value: f64) -> Result<chrono::Duration, ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidHours { field, value });
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is finite, non-negative and rounded"
    )]
    let millis = (value * 3_600_000.0).round() as i64;
    Ok(chrono::Duration::milliseconds(millis))
}
