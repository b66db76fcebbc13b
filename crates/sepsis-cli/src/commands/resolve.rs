//! Resolve command for filling in missing stay IDs of one event table.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use sepsis_core::EventKind;
use sepsis_io::schema::stays_from_table;

use super::util::{read_table, resolve_table, write_stats, write_table};
use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    kind: EventKind,
    stays_path: &Path,
    input: &Path,
    output: &Path,
) -> Result<()> {
    let delimiter = config.delimiter_byte()?;
    let resolver = config.resolver_config()?;

    let stays = stays_from_table(&read_table(stays_path, delimiter)?)
        .context("failed to load stays")?;
    let mut table = read_table(input, delimiter)?;

    let stats = resolve_table(&mut table, &stays, kind, &resolver)?;
    write_table(&table, output, delimiter)?;

    write_stats(writer, kind, &stats)
}
