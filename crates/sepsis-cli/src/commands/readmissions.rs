//! Readmissions command for cleaning a demographics table.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use sepsis_io::{DemographicsSummary, process_demographics};

use super::util::{read_table, write_table};
use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config, input: &Path, output: &Path) -> Result<()> {
    let delimiter = config.delimiter_byte()?;
    let cutoff = config.readmission_cutoff()?;

    let (table, summary) = process_demographics(read_table(input, delimiter)?, cutoff)
        .context("failed to process demographics")?;
    write_table(&table, output, delimiter)?;

    write_summary(writer, &summary)
}

pub fn write_summary<W: Write>(writer: &mut W, summary: &DemographicsSummary) -> Result<()> {
    writeln!(
        writer,
        "demographics: {} rows, {} duplicates dropped, {} readmissions",
        summary.rows_read, summary.duplicates_dropped, summary.readmissions
    )?;
    Ok(())
}
