//! Column names and conversions between tables and core types.

use chrono::{DateTime, Utc};
use sepsis_core::{
    Admission, ClinicalEvent, EncounterId, EventId, EventKind, JoinKey, OnsetRecord, StayId,
    StayInterval, SubjectId, ValidationError,
};

use crate::{Table, TableError, format_epoch_seconds, normalize_id, parse_epoch_seconds};

pub const SUBJECT_ID: &str = "subject_id";
pub const HADM_ID: &str = "hadm_id";
pub const STAY_ID: &str = "stay_id";
pub const CHARTTIME: &str = "charttime";
pub const CHARTDATE: &str = "chartdate";
pub const TIMESTP: &str = "timestp";
pub const STARTTIME: &str = "starttime";
pub const INTIME: &str = "intime";
pub const OUTTIME: &str = "outtime";
pub const ADMITTIME: &str = "admittime";
pub const DISCHTIME: &str = "dischtime";
pub const ONSET_TIME: &str = "onset_time";
pub const RE_ADMISSION: &str = "re_admission";

/// Demographic columns whose missing values mean zero.
pub const ZERO_FILLED: [&str; 3] = ["morta_90", "morta_hosp", "charlson_comorbidity_index"];

/// Column holding an event's reference time.
pub const fn time_column(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Culture => CHARTTIME,
        EventKind::Antibiotic => STARTTIME,
    }
}

/// Column holding the key used to find candidate stays.
pub const fn key_column(key: JoinKey) -> &'static str {
    match key {
        JoinKey::Subject => SUBJECT_ID,
        JoinKey::Encounter => HADM_ID,
    }
}

fn id_error(table: &Table, row: usize, col: usize, source: ValidationError) -> TableError {
    TableError::InvalidId {
        table: table.name().to_string(),
        row,
        column: table.headers()[col].clone(),
        source,
    }
}

fn parse_id<T>(
    table: &Table,
    row: usize,
    col: usize,
    make: impl Fn(String) -> Result<T, ValidationError>,
) -> Result<Option<T>, TableError> {
    table
        .value(row, col)
        .map(|v| make(normalize_id(v).to_string()).map_err(|e| id_error(table, row, col, e)))
        .transpose()
}

fn require_id<T>(
    table: &Table,
    row: usize,
    col: usize,
    make: impl Fn(String) -> Result<T, ValidationError>,
) -> Result<T, TableError> {
    let value = table.required_value(row, col)?;
    make(normalize_id(value).to_string()).map_err(|e| id_error(table, row, col, e))
}

fn timestamp_error(table: &Table, row: usize, col: usize, value: &str) -> TableError {
    TableError::InvalidTimestamp {
        table: table.name().to_string(),
        row,
        column: table.headers()[col].clone(),
        value: value.to_string(),
    }
}

fn parse_time(table: &Table, row: usize, col: usize) -> Result<Option<DateTime<Utc>>, TableError> {
    table
        .value(row, col)
        .map(|v| parse_epoch_seconds(v).ok_or_else(|| timestamp_error(table, row, col, v)))
        .transpose()
}

fn require_time(table: &Table, row: usize, col: usize) -> Result<DateTime<Utc>, TableError> {
    let value = table.required_value(row, col)?;
    parse_epoch_seconds(value).ok_or_else(|| timestamp_error(table, row, col, value))
}

/// Reads stay intervals. Every row must carry all five stay columns.
pub fn stays_from_table(table: &Table) -> Result<Vec<StayInterval>, TableError> {
    let stay = table.require_column(STAY_ID)?;
    let subject = table.require_column(SUBJECT_ID)?;
    let encounter = table.require_column(HADM_ID)?;
    let intime = table.require_column(INTIME)?;
    let outtime = table.require_column(OUTTIME)?;

    (0..table.len())
        .map(|row| {
            Ok(StayInterval {
                stay_id: require_id(table, row, stay, StayId::new)?,
                subject: require_id(table, row, subject, SubjectId::new)?,
                encounter: require_id(table, row, encounter, EncounterId::new)?,
                start_time: require_time(table, row, intime)?,
                end_time: require_time(table, row, outtime)?,
            })
        })
        .collect()
}

/// Reads clinical events of `kind`, one per row, with `sequence` equal to the
/// row number.
///
/// The reference time column is required and must be filled on every row.
/// `subject_id`, `hadm_id` and `stay_id` are optional columns with optional
/// values.
pub fn events_from_table(table: &Table, kind: EventKind) -> Result<Vec<ClinicalEvent>, TableError> {
    let time = table.require_column(time_column(kind))?;
    let subject = table.column_index(SUBJECT_ID);
    let encounter = table.column_index(HADM_ID);
    let stay = table.column_index(STAY_ID);

    (0..table.len())
        .map(|row| {
            let id = EventId::new(format!("{}-{row}", table.name()))
                .map_err(|e| id_error(table, row, time, e))?;
            let mut event = ClinicalEvent::new(id, kind, row, require_time(table, row, time)?);
            if let Some(col) = subject {
                event.subject = parse_id(table, row, col, SubjectId::new)?;
            }
            if let Some(col) = encounter {
                event.encounter = parse_id(table, row, col, EncounterId::new)?;
            }
            if let Some(col) = stay {
                event.stay_id = parse_id(table, row, col, StayId::new)?;
            }
            Ok(event)
        })
        .collect()
}

/// Writes each event's stay into the `stay_id` column of the row it was read
/// from, adding the column if needed.
///
/// `events` must have been read from `table`.
pub fn apply_stays(table: &mut Table, events: &[ClinicalEvent]) {
    let mut values = vec![String::new(); table.len()];
    if let Some(col) = table.column_index(STAY_ID) {
        for (row, value) in values.iter_mut().enumerate() {
            if let Some(existing) = table.value(row, col) {
                *value = existing.to_string();
            }
        }
    }
    for event in events {
        if let (Some(stay_id), Some(value)) = (&event.stay_id, values.get_mut(event.sequence)) {
            *value = stay_id.to_string();
        }
    }
    table.set_column(STAY_ID, values);
}

/// Reads the admission columns of a demographics table.
pub fn admissions_from_table(table: &Table) -> Result<Vec<Admission>, TableError> {
    let subject = table.require_column(SUBJECT_ID)?;
    let admit = table.require_column(ADMITTIME)?;
    let discharge = table.require_column(DISCHTIME)?;

    (0..table.len())
        .map(|row| {
            Ok(Admission {
                subject: require_id(table, row, subject, SubjectId::new)?,
                admit_time: parse_time(table, row, admit)?,
                discharge_time: parse_time(table, row, discharge)?,
            })
        })
        .collect()
}

/// Builds the `subject_id|stay_id|onset_time` output table.
pub fn onset_table(records: &[OnsetRecord]) -> Table {
    let headers = vec![
        SUBJECT_ID.to_string(),
        STAY_ID.to_string(),
        ONSET_TIME.to_string(),
    ];
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.subject.as_ref().map(ToString::to_string).unwrap_or_default(),
                r.stay_id.to_string(),
                format_epoch_seconds(r.onset_time),
            ]
        })
        .collect();
    Table::new("onset", headers, rows)
}
