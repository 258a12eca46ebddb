//! Command implementations for the CIL index CLI.
//!
//! This module contains the business logic behind each query mode; `main.rs`
//! is responsible only for argument parsing and wiring these functions
//! together.

use std::collections::HashSet;
use std::path::Path;

use cil_data::normalize;
use cil_parser::parse_exprs;
use tracing::{info, warn};

use crate::errors::{IndexError, Result};
use crate::index::Index;
use crate::query::{self, TeSearchInput, TtSearchInput};
use crate::store::{Filters, Store};

fn mtime_us(path: &Path) -> Result<i64> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata.modified()?;
    let since_epoch = modified
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Ok((since_epoch.as_secs_f64() * 1_000_000.0).floor() as i64)
}

/// Refresh the store with the contents of each file in `paths`, skipping
/// files that no longer exist or are already fresh (§4.3).
pub fn refresh_files(store: &mut dyn Store, paths: &[String]) -> Result<()> {
    for path in paths {
        let p = Path::new(path);
        if !p.exists() {
            warn!("{path} no longer exists on disk, skipping");
            continue;
        }
        let mtime = mtime_us(p)?;
        if store.file_fresh(path, mtime)? {
            info!("{path} is fresh, skipping parse");
            continue;
        }

        let contents = std::fs::read_to_string(p)?;
        let exprs = parse_exprs(&contents).map_err(|source| IndexError::Parse {
            file: path.clone(),
            source,
        })?;
        let normalized = normalize(path, &exprs)?;
        store.upsert_file(path, mtime, &normalized)?;
    }
    Ok(())
}

/// Build the attribute index from every TAS record currently in the store.
pub fn build_index(store: &dyn Store) -> Result<Index> {
    let tas = store.query_tas(&Filters::default())?;
    Ok(Index::build(&tas))
}

fn one_or_empty(value: &Option<String>) -> HashSet<String> {
    value.iter().cloned().collect()
}

pub struct QueryArgs {
    pub source: Option<String>,
    pub target: Option<String>,
    pub not_source: Option<String>,
    pub not_target: Option<String>,
    pub class: Option<String>,
    pub subject: Option<String>,
    pub filename: Option<String>,
    pub perms: Option<String>,
}

/// Run a TE search and print `<file>:<canonical_string>` for each match.
pub fn te_command(store: &dyn Store, index: &Index, kind: Option<cil_data::RuleKind>, args: &QueryArgs) -> Result<()> {
    let input = TeSearchInput {
        source: one_or_empty(&args.source),
        target: one_or_empty(&args.target),
        not_source: one_or_empty(&args.not_source),
        not_target: one_or_empty(&args.not_target),
        class: args.class.clone(),
        rule_kind: kind,
        perms: args.perms.as_ref().map(|p| p.split_whitespace().map(str::to_string).collect()),
        excluded_file: None,
        excluded_basename: None,
    };
    let result = query::te_search(store, index, &input)?;
    for (file, string) in &result.matches {
        println!("{file}:{string}");
    }
    Ok(())
}

/// Run a TT search and print `<file>:<canonical_string>` for each candidate.
pub fn tt_command(store: &dyn Store, index: &Index, args: &QueryArgs) -> Result<()> {
    let input = TtSearchInput {
        source: one_or_empty(&args.source),
        target: one_or_empty(&args.target),
        not_source: one_or_empty(&args.not_source),
        not_target: one_or_empty(&args.not_target),
        class: args.class.clone(),
        subject: args.subject.clone(),
        filename: args.filename.clone(),
        excluded_file: None,
        excluded_basename: None,
    };
    let result = query::tt_search(store, index, &input)?;
    for (file, string) in &result.matches {
        println!("{file}:{string}");
    }
    Ok(())
}

/// Run a TAS search and print `<file>:<canonical_string>` for each match.
pub fn attr_command(store: &dyn Store, args: &QueryArgs) -> Result<()> {
    let matches = query::search_taset(store, args.source.as_deref(), args.target.as_deref())?;
    for (file, string) in &matches {
        println!("{file}:{string}");
    }
    Ok(())
}

/// Run `resolveattr` and print the sorted result set, one symbol per line.
pub fn resolveattr_command(index: &Index, args: &QueryArgs) -> Result<()> {
    let source = one_or_empty(&args.source);
    let target = one_or_empty(&args.target);
    for symbol in query::resolveattr(index, &source, &target) {
        println!("{symbol}");
    }
    Ok(())
}

/// Run from-diff against `from_path` and print its status lines.
pub fn from_diff_command(store: &dyn Store, index: &Index, from_path: &str) -> Result<()> {
    let contents = std::fs::read_to_string(from_path)?;
    let report = query::from_diff(store, index, from_path, &contents)?;
    for line in &report.lines {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use tempfile::NamedTempFile;

    #[test]
    fn refresh_skips_a_file_removed_since_listing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let result = refresh_files(&mut store, &["/nonexistent/path.cil".to_string()]);
        assert!(result.is_ok());
        assert!(store.list_files().unwrap().is_empty());
    }

    #[test]
    fn refresh_parses_and_stores_a_real_file() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "(allow t1 t2 (c1 (p1)))").unwrap();
        let path = file.path().to_string_lossy().to_string();

        refresh_files(&mut store, std::slice::from_ref(&path)).unwrap();
        assert_eq!(store.list_files().unwrap(), vec![path]);
    }

    #[test]
    fn refresh_is_idempotent_on_unchanged_mtime() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "(allow t1 t2 (c1 (p1)))").unwrap();
        let path = file.path().to_string_lossy().to_string();

        refresh_files(&mut store, std::slice::from_ref(&path)).unwrap();
        refresh_files(&mut store, std::slice::from_ref(&path)).unwrap();

        let te = store.query_te(&Filters::default()).unwrap();
        assert_eq!(te.len(), 1);
    }
}
