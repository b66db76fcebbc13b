//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use sepsis_core::types::hours;
use sepsis_core::{OnsetConfig, OnsetSelection, ResolverConfig, TieBreak};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the extracted input tables.
    pub input_dir: PathBuf,

    /// Directory the processed tables are written to.
    pub output_dir: PathBuf,

    /// Field delimiter for every table read or written.
    pub delimiter: char,

    /// How far outside a stay an event may fall and still be assigned to it.
    pub window_hours: f64,

    /// Policy for events that match several stays.
    pub tie_break: TieBreak,

    /// Longest gap for an antibiotic given before its culture.
    pub max_abx_before_culture_hours: f64,

    /// Longest gap for an antibiotic given after its culture.
    pub max_abx_after_culture_hours: f64,

    /// Which qualifying antibiotic decides a stay's onset.
    pub onset_selection: OnsetSelection,

    /// Readmission cutoff after the previous discharge.
    pub readmission_days: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("processed_files"),
            output_dir: PathBuf::from("processed_files"),
            delimiter: '|',
            window_hours: 48.0,
            tie_break: TieBreak::Last,
            max_abx_before_culture_hours: 24.0,
            max_abx_after_culture_hours: 72.0,
            onset_selection: OnsetSelection::FirstAntibiotic,
            readmission_days: 30.0,
        }
    }
}

impl Config {
    /// Loads configuration from the default location, then `config_path` if
    /// given, then `SEPSIS_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (SEPSIS_*)
        figment = figment.merge(Env::prefixed("SEPSIS_"));

        figment.extract()
    }

    /// The delimiter as the single byte the table reader expects.
    pub fn delimiter_byte(&self) -> Result<u8> {
        let byte = u8::try_from(self.delimiter).ok().filter(u8::is_ascii);
        byte.with_context(|| {
            format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )
        })
    }

    pub fn resolver_config(&self) -> Result<ResolverConfig> {
        Ok(ResolverConfig {
            window: hours("window_hours", self.window_hours)?,
            tie_break: self.tie_break,
        })
    }

    pub fn onset_config(&self) -> Result<OnsetConfig> {
        Ok(OnsetConfig {
            max_abx_before_culture: hours(
                "max_abx_before_culture_hours",
                self.max_abx_before_culture_hours,
            )?,
            max_abx_after_culture: hours(
                "max_abx_after_culture_hours",
                self.max_abx_after_culture_hours,
            )?,
            selection: self.onset_selection,
        })
    }

    pub fn readmission_cutoff(&self) -> Result<chrono::Duration> {
        Ok(hours("readmission_days", self.readmission_days * 24.0)?)
    }

    /// Path of an input table by file stem.
    pub fn input_path(&self, stem: &str) -> PathBuf {
        self.input_dir.join(format!("{stem}.csv"))
    }

    /// Path of an output table by file stem.
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}.csv"))
    }
}

/// Returns the platform-specific config directory for sepsis.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sepsis"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_pipeline_constants() {
        let config = Config::default();
        let resolver = config.resolver_config().unwrap();
        let onset = config.onset_config().unwrap();

        assert_eq!(resolver.window, chrono::Duration::hours(48));
        assert_eq!(resolver.tie_break, TieBreak::Last);
        assert_eq!(onset.max_abx_before_culture, chrono::Duration::hours(24));
        assert_eq!(onset.max_abx_after_culture, chrono::Duration::hours(72));
        assert_eq!(
            config.readmission_cutoff().unwrap(),
            chrono::Duration::days(30)
        );
        assert_eq!(config.delimiter_byte().unwrap(), b'|');
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "window_hours = 12\ntie_break = \"nearest\"\nonset_selection = \"earliest_onset\"\ndelimiter = \",\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert_eq!(
            config.resolver_config().unwrap().window,
            chrono::Duration::hours(12)
        );
        assert_eq!(config.tie_break, TieBreak::Nearest);
        assert_eq!(config.onset_selection, OnsetSelection::EarliestOnset);
        assert_eq!(config.delimiter_byte().unwrap(), b',');
    }

    #[test]
    fn test_rejects_invalid_values() {
        let config = Config {
            window_hours: -1.0,
            delimiter: 'é',
            ..Config::default()
        };
        assert!(config.resolver_config().is_err());
        assert!(config.delimiter_byte().is_err());
    }

    #[test]
    fn test_paths_use_csv_extension() {
        let config = Config {
            input_dir: PathBuf::from("in"),
            output_dir: PathBuf::from("out"),
            ..Config::default()
        };
        assert_eq!(config.input_path("abx"), PathBuf::from("in/abx.csv"));
        assert_eq!(
            config.output_path("onset"),
            PathBuf::from("out/onset.csv")
        );
    }
}
