//! CLI subcommand implementations.

pub mod onset;
pub mod preprocess;
pub mod readmissions;
pub mod resolve;
mod util;
