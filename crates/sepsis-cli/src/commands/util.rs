//! Shared utilities for CLI commands.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use sepsis_core::{
    ClinicalEvent, EventKind, ResolutionStats, ResolverConfig, StayInterval, resolve_stays,
};
use sepsis_io::Table;
use sepsis_io::schema::{STAY_ID, apply_stays, events_from_table, key_column};

pub fn read_table(path: &Path, delimiter: u8) -> Result<Table> {
    Table::read(path, delimiter).with_context(|| format!("failed to read {}", path.display()))
}

/// Writes `table`, creating the parent directory if needed.
pub fn write_table(table: &Table, path: &Path, delimiter: u8) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    table
        .write(path, delimiter)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Resolves the events held in `table` and writes their stays back into it.
///
/// The table must carry the join key column for `kind`.
pub fn resolve_table(
    table: &mut Table,
    stays: &[StayInterval],
    kind: EventKind,
    config: &ResolverConfig,
) -> Result<ResolutionStats> {
    let context = || format!("failed to load {}", kind.label());
    table
        .require_column(key_column(kind.join_key()))
        .with_context(context)?;
    let events = events_from_table(table, kind).with_context(context)?;
    let resolution = resolve_stays(&events, stays, kind.join_key(), config);
    apply_stays(table, &resolution.events);
    Ok(resolution.stats)
}

/// Loads events of `kind` whose stays have been resolved.
///
/// The table must carry a `stay_id` column.
pub fn resolved_events(table: &Table, kind: EventKind) -> Result<Vec<ClinicalEvent>> {
    let context = || format!("failed to load resolved {}", kind.label());
    table.require_column(STAY_ID).with_context(context)?;
    events_from_table(table, kind).with_context(context)
}

pub fn write_stats<W: Write>(writer: &mut W, kind: EventKind, stats: &ResolutionStats) -> Result<()> {
    writeln!(
        writer,
        "{}: {} total, {} already assigned, {} resolved ({} ambiguous), {} unresolved",
        kind.label(),
        stats.total,
        stats.already_assigned,
        stats.resolved,
        stats.ambiguous,
        stats.unresolved
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_table_creates_parent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested/out/onset.csv");
        let table = Table::new("onset", vec!["stay_id".to_string()], vec![vec!["1".to_string()]]);

        write_table(&table, &path, b'|').unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "stay_id\n1\n");
    }

    #[test]
    fn test_read_table_names_missing_file() {
        let err = read_table(Path::new("/nonexistent/abx.csv"), b'|').unwrap_err();
        assert!(err.to_string().contains("/nonexistent/abx.csv"));
    }

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            name,
            headers.iter().map(|h| (*h).to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| (*v).to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_resolve_table_requires_join_key_column() {
        let mut cultures = table("bacterio", &["hadm_id", "charttime"], &[&["10", "900"]]);
        let err = resolve_table(
            &mut cultures,
            &[],
            EventKind::Culture,
            &ResolverConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "failed to load cultures: table bacterio has no column subject_id"
        );

        let mut abx = table("abx", &["subject_id", "starttime"], &[&["1", "950"]]);
        let err = resolve_table(&mut abx, &[], EventKind::Antibiotic, &ResolverConfig::default())
            .unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "failed to load antibiotics: table abx has no column hadm_id"
        );
    }

    #[test]
    fn test_resolved_events_require_stay_column() {
        let abx = table("abx", &["hadm_id", "starttime"], &[&["10", "950"]]);
        let err = resolved_events(&abx, EventKind::Antibiotic).unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "failed to load resolved antibiotics: table abx has no column stay_id"
        );

        let abx = table("abx", &["stay_id", "starttime"], &[&["", "950"]]);
        assert_eq!(resolved_events(&abx, EventKind::Antibiotic).unwrap().len(), 1);
    }

    #[test]
    fn test_write_stats() {
        let stats = ResolutionStats {
            total: 5,
            already_assigned: 2,
            resolved: 2,
            ambiguous: 1,
            unresolved: 1,
        };
        let mut output = Vec::new();
        write_stats(&mut output, EventKind::Culture, &stats).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "cultures: 5 total, 2 already assigned, 2 resolved (1 ambiguous), 1 unresolved\n"
        );
    }
}
