//! Sepsis preprocessing CLI library.
//!
//! This crate provides the command-line interface over `sepsis-core` and
//! `sepsis-io`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, EventArg};
pub use config::Config;
