//! Preprocess command running the whole pipeline over the input directory.
//!
//! # Inputs
//!
//! Read from `input_dir`: `abx`, `culture`, `microbio`, `demog`, `labs_ce`
//! and `labs_le`.
//!
//! # Outputs
//!
//! Written to `output_dir`: `onset`, `bacterio_processed`, `abx_processed`,
//! `demog_processed` and `labu`.
//!
//! # Algorithm
//!
//! 1. Load the six input tables concurrently
//! 2. Merge microbiology and culture extracts into one culture table
//! 3. Stack chart-event and lab-event measurements into one lab table
//! 4. Clean demographics and flag readmissions; its rows are the ICU stays
//! 5. Resolve missing stays for cultures (by subject) and antibiotics (by
//!    admission)
//! 6. Detect presumed infection onsets from the resolved tables

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use sepsis_core::{EventKind, ResolutionStats, detect_onsets};
use sepsis_io::schema::{onset_table, stays_from_table};
use sepsis_io::{DemographicsSummary, consolidate_labs, merge_cultures, process_demographics};

use super::readmissions::write_summary;
use super::util::{read_table, resolve_table, resolved_events, write_stats, write_table};
use crate::Config;

/// Counts reported after a pipeline run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PipelineSummary {
    pub cultures: ResolutionStats,
    pub antibiotics: ResolutionStats,
    pub demographics: DemographicsSummary,
    pub lab_rows: usize,
    pub onsets: usize,
}

pub fn run<W: Write>(writer: &mut W, config: &Config, json: bool) -> Result<()> {
    let summary = preprocess(config)?;

    if json {
        serde_json::to_writer_pretty(&mut *writer, &summary)
            .context("failed to serialize summary")?;
        writeln!(writer)?;
        return Ok(());
    }

    write_stats(writer, EventKind::Culture, &summary.cultures)?;
    write_stats(writer, EventKind::Antibiotic, &summary.antibiotics)?;
    write_summary(writer, &summary.demographics)?;
    writeln!(writer, "labs: {} rows", summary.lab_rows)?;
    writeln!(writer, "presumed infection onsets: {}", summary.onsets)?;
    Ok(())
}

/// Runs the pipeline and writes every output table.
pub fn preprocess(config: &Config) -> Result<PipelineSummary> {
    let delimiter = config.delimiter_byte()?;
    let resolver = config.resolver_config()?;
    let onset_config = config.onset_config()?;
    let cutoff = config.readmission_cutoff()?;

    let read = |stem: &str| read_table(&config.input_path(stem), delimiter);
    let (((abx, culture), (microbio, demog)), (labs_ce, labs_le)) = rayon::join(
        || {
            rayon::join(
                || rayon::join(|| read("abx"), || read("culture")),
                || rayon::join(|| read("microbio"), || read("demog")),
            )
        },
        || rayon::join(|| read("labs_ce"), || read("labs_le")),
    );

    let mut bacterio =
        merge_cultures(microbio?, culture?).context("failed to merge culture tables")?;
    let mut abx = abx?;
    let labu = consolidate_labs(labs_ce?, labs_le?);
    let (demog, demographics) =
        process_demographics(demog?, cutoff).context("failed to process demographics")?;
    let stays = stays_from_table(&demog).context("failed to load stays from demographics")?;
    tracing::info!(stays = stays.len(), "loaded stays");

    let cultures = resolve_table(&mut bacterio, &stays, EventKind::Culture, &resolver)?;
    let antibiotics = resolve_table(&mut abx, &stays, EventKind::Antibiotic, &resolver)?;

    let onsets = detect_onsets(
        &resolved_events(&abx, EventKind::Antibiotic)?,
        &resolved_events(&bacterio, EventKind::Culture)?,
        &onset_config,
    );
    tracing::info!(onsets = onsets.len(), "onsets detected");

    write_table(&onset_table(&onsets), &config.output_path("onset"), delimiter)?;
    write_table(&bacterio, &config.output_path("bacterio_processed"), delimiter)?;
    write_table(&abx, &config.output_path("abx_processed"), delimiter)?;
    write_table(&demog, &config.output_path("demog_processed"), delimiter)?;
    write_table(&labu, &config.output_path("labu"), delimiter)?;
    tracing::info!(output_dir = %config.output_dir.display(), "outputs written");

    Ok(PipelineSummary {
        cultures,
        antibiotics,
        demographics,
        lab_rows: labu.len(),
        onsets: onsets.len(),
    })
}
