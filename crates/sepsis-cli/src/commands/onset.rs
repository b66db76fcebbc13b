//! Onset command for deriving presumed infection onsets from resolved tables.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use sepsis_core::{EventKind, detect_onsets};
use sepsis_io::schema::onset_table;

use super::util::{read_table, resolved_events, write_table};
use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    antibiotics: &Path,
    cultures: &Path,
    output: &Path,
) -> Result<()> {
    let delimiter = config.delimiter_byte()?;
    let onset_config = config.onset_config()?;

    let antibiotics = resolved_events(&read_table(antibiotics, delimiter)?, EventKind::Antibiotic)?;
    let cultures = resolved_events(&read_table(cultures, delimiter)?, EventKind::Culture)?;

    let onsets = detect_onsets(&antibiotics, &cultures, &onset_config);
    write_table(&onset_table(&onsets), output, delimiter)?;

    writeln!(writer, "presumed infection onsets: {}", onsets.len())?;
    Ok(())
}
