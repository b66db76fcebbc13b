//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use sepsis_core::EventKind;

/// Sepsis-3 onset preprocessing.
///
/// Assigns ICU stays to cultures and antibiotics that arrive without one and
/// derives the presumed infection onset time per stay.
#[derive(Debug, Parser)]
#[command(name = "sepsis", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the whole pipeline over the configured input directory.
    Preprocess {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Fill in missing stay IDs for one event table.
    Resolve {
        /// Which kind of events the input holds.
        #[arg(value_enum)]
        kind: EventArg,

        /// Table of ICU stays with `stay_id`, `subject_id`, `hadm_id`,
        /// `intime` and `outtime`.
        #[arg(long)]
        stays: PathBuf,

        /// Event table to resolve.
        #[arg(long)]
        input: PathBuf,

        /// Where to write the resolved table.
        #[arg(long)]
        output: PathBuf,
    },

    /// Derive presumed infection onsets from resolved tables.
    Onset {
        /// Resolved antibiotic table.
        #[arg(long)]
        antibiotics: PathBuf,

        /// Resolved culture table.
        #[arg(long)]
        cultures: PathBuf,

        /// Where to write the onset table.
        #[arg(long)]
        output: PathBuf,
    },

    /// Drop duplicate admissions and flag readmissions.
    Readmissions {
        /// Demographics table.
        #[arg(long)]
        input: PathBuf,

        /// Where to write the processed table.
        #[arg(long)]
        output: PathBuf,
    },
}

/// Event table kinds accepted by `resolve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventArg {
    Cultures,
    Antibiotics,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Cultures => Self::Culture,
            EventArg::Antibiotics => Self::Antibiotic,
        }
    }
}
