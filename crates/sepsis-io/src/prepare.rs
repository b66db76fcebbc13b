//! Table-level preparation steps that run before stay resolution.

use chrono::Duration;
use serde::Serialize;
use sepsis_core::{Admission, dedup_admissions, flag_readmissions};

use crate::schema::{
    CHARTDATE, CHARTTIME, RE_ADMISSION, TIMESTP, ZERO_FILLED, admissions_from_table,
};
use crate::{Table, TableError};

/// Merges the microbiology and culture extracts into one culture table.
///
/// Microbiology rows without a chart time fall back to their chart date, and
/// the chart date column is dropped. Microbiology rows come first.
pub fn merge_cultures(mut microbio: Table, culture: Table) -> Result<Table, TableError> {
    let charttime = microbio.require_column(CHARTTIME)?;
    if let Some(chartdate) = microbio.column_index(CHARTDATE) {
        let filled: Vec<String> = (0..microbio.len())
            .map(|row| {
                microbio
                    .value(row, charttime)
                    .or_else(|| microbio.value(row, chartdate))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        microbio.set_column(CHARTTIME, filled);
        microbio.drop_column(CHARTDATE);
    }

    tracing::debug!(
        microbio = microbio.len(),
        culture = culture.len(),
        "merging culture sources"
    );
    Ok(Table::concat("bacterio", &[microbio, culture]))
}

/// Stacks chart-event and lab-event measurements into one lab table.
///
/// Lab events stamp their rows with `timestp`, which becomes `charttime`.
/// Chart events come first.
pub fn consolidate_labs(chart_labs: Table, mut lab_events: Table) -> Table {
    lab_events.rename_column(TIMESTP, CHARTTIME);
    tracing::debug!(
        chart = chart_labs.len(),
        lab = lab_events.len(),
        "consolidating lab measurements"
    );
    Table::concat("labu", &[chart_labs, lab_events])
}

/// Counts from demographics processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DemographicsSummary {
    pub rows_read: usize,
    pub duplicates_dropped: usize,
    pub readmissions: usize,
}

/// Cleans the demographics table and adds the `re_admission` flag.
///
/// 1. Empty mortality and comorbidity cells become `0`
/// 2. Rows repeating an earlier (admit, discharge) pair are dropped
/// 3. Rows are ordered by subject and admit time, and `re_admission` is `1`
///    when the admission starts within `cutoff` of the subject's previous
///    discharge
pub fn process_demographics(
    mut table: Table,
    cutoff: Duration,
) -> Result<(Table, DemographicsSummary), TableError> {
    let rows_read = table.len();
    for column in ZERO_FILLED {
        table.fill_missing(column, "0");
    }

    let admissions = admissions_from_table(&table)?;
    let keep = dedup_admissions(&admissions);
    let table = table.select_rows(&keep);
    let kept: Vec<Admission> = keep.iter().map(|&i| admissions[i].clone()).collect();

    let flags = flag_readmissions(&kept, cutoff);
    let order: Vec<usize> = flags.iter().map(|f| f.index).collect();
    let mut table = table.select_rows(&order);
    table.set_column(
        RE_ADMISSION,
        flags
            .iter()
            .map(|f| (if f.readmitted { "1" } else { "0" }).to_string())
            .collect(),
    );

    let summary = DemographicsSummary {
        rows_read,
        duplicates_dropped: rows_read - keep.len(),
        readmissions: flags.iter().filter(|f| f.readmitted).count(),
    };
    tracing::info!(
        rows = summary.rows_read,
        duplicates = summary.duplicates_dropped,
        readmissions = summary.readmissions,
        "demographics processed"
    );
    Ok((table, summary))
}
