//! The persistent index: an embedded SQLite-backed [`Store`] implementation.
//!
//! Records are keyed by `(file, mtime_us)`. `upsert_file` is the only
//! mutation path: a file's prior records are deleted and the fresh ones
//! inserted, inside one transaction per file (§4.3 of the design).

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use cil_data::{Normalized, RuleKind, TASet, TERule, Typetransition};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::errors::Result;

/// Uniform filter structure shared by all three query modes (§4.3).
///
/// Inclusion sets match when the record's field is a member; exclusion sets
/// match when it is *not* a member; equality constraints match exactly.
/// Fields left `None` match everything. `perms` and `filename` only apply
/// to TE and TT searches respectively.
#[derive(Debug, Default, Clone)]
pub struct Filters {
    pub file: Option<HashSet<String>>,
    pub source: Option<HashSet<String>>,
    pub target: Option<HashSet<String>>,
    pub not_source: Option<HashSet<String>>,
    pub not_target: Option<HashSet<String>>,
    pub class: Option<String>,
    pub rule_kind: Option<RuleKind>,
    pub subject: Option<String>,
    pub perms: Option<HashSet<String>>,
    pub filename: Option<String>,
    pub excluded_file: Option<String>,
}

impl Filters {
    fn set_matches(set: &Option<HashSet<String>>, value: &str) -> bool {
        set.as_ref().is_none_or(|s| s.contains(value))
    }

    fn not_set_matches(set: &Option<HashSet<String>>, value: &str) -> bool {
        set.as_ref().is_none_or(|s| !s.contains(value))
    }

    pub fn matches_te(&self, r: &TERule) -> bool {
        if self.excluded_file.as_deref() == Some(r.file.as_str()) {
            return false;
        }
        Self::set_matches(&self.file, &r.file)
            && Self::set_matches(&self.source, &r.source)
            && Self::set_matches(&self.target, &r.target)
            && Self::not_set_matches(&self.not_source, &r.source)
            && Self::not_set_matches(&self.not_target, &r.target)
            && self.class.as_deref().is_none_or(|c| c == r.class)
            && self.rule_kind.as_ref().is_none_or(|k| k == &r.rule_kind)
    }

    pub fn matches_tt(&self, r: &Typetransition) -> bool {
        if self.excluded_file.as_deref() == Some(r.file.as_str()) {
            return false;
        }
        Self::set_matches(&self.file, &r.file)
            && Self::set_matches(&self.source, &r.source)
            && Self::set_matches(&self.target, &r.target)
            && Self::not_set_matches(&self.not_source, &r.source)
            && Self::not_set_matches(&self.not_target, &r.target)
            && self.class.as_deref().is_none_or(|c| c == r.class)
            && self.subject.as_deref().is_none_or(|s| s == r.subject)
    }

    pub fn matches_tas(&self, r: &TASet) -> bool {
        if self.excluded_file.as_deref() == Some(r.file.as_str()) {
            return false;
        }
        Self::set_matches(&self.file, &r.file)
    }
}

/// Abstract persistence interface for normalized CIL records.
pub trait Store {
    fn upsert_file(&mut self, path: &str, mtime_us: i64, records: &Normalized) -> Result<()>;
    fn file_fresh(&self, path: &str, mtime_us: i64) -> Result<bool>;
    fn list_files(&self) -> Result<Vec<String>>;
    fn query_te(&self, filters: &Filters) -> Result<Vec<TERule>>;
    fn query_tt(&self, filters: &Filters) -> Result<Vec<Typetransition>>;
    fn query_tas(&self, filters: &Filters) -> Result<Vec<TASet>>;
}

/// SQLite-backed [`Store`], the one concrete backing this crate ships.
pub struct SqliteStore {
    conn: Connection,
}

fn join_space(items: &[String]) -> String {
    items.join(" ")
}

fn split_space(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

fn encode_bools(values: &[bool]) -> String {
    values
        .iter()
        .map(|b| if *b { "1" } else { "0" })
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_bools(s: &str) -> Vec<bool> {
    s.split_whitespace().map(|tok| tok == "1").collect()
}

impl SqliteStore {
    /// Open (creating if absent) a SQLite-backed store at `path`, with the
    /// given busy timeout for lock acquisition.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// An in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                mtime_us INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS te_rules (
                file TEXT NOT NULL, string TEXT NOT NULL,
                optional TEXT NOT NULL, booleanvalue TEXT NOT NULL,
                rule_kind TEXT NOT NULL, source TEXT NOT NULL,
                target TEXT NOT NULL, class TEXT NOT NULL, perms TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS typeattributes (
                file TEXT NOT NULL, string TEXT NOT NULL,
                optional TEXT NOT NULL, booleanvalue TEXT NOT NULL,
                attr TEXT NOT NULL, members TEXT NOT NULL, is_logical INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS typetransitions (
                file TEXT NOT NULL, string TEXT NOT NULL,
                optional TEXT NOT NULL, booleanvalue TEXT NOT NULL,
                subject TEXT NOT NULL, source TEXT NOT NULL,
                class TEXT NOT NULL, target TEXT NOT NULL, filename TEXT
            );
            CREATE INDEX IF NOT EXISTS te_rules_file ON te_rules(file);
            CREATE INDEX IF NOT EXISTS typeattributes_file ON typeattributes(file);
            CREATE INDEX IF NOT EXISTS typetransitions_file ON typetransitions(file);
            ",
        )?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn upsert_file(&mut self, path: &str, mtime_us: i64, records: &Normalized) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let stored_mtime: Option<i64> = tx
            .query_row("SELECT mtime_us FROM files WHERE path = ?1", params![path], |r| r.get(0))
            .optional()?;
        if stored_mtime == Some(mtime_us) {
            debug!("{path} already fresh at refresh time, skipping write");
            tx.commit()?;
            return Ok(());
        }

        tx.execute("DELETE FROM te_rules WHERE file = ?1", params![path])?;
        tx.execute("DELETE FROM typeattributes WHERE file = ?1", params![path])?;
        tx.execute("DELETE FROM typetransitions WHERE file = ?1", params![path])?;

        for r in &records.te {
            tx.execute(
                "INSERT INTO te_rules (file, string, optional, booleanvalue, rule_kind, source, target, class, perms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    r.file, r.string,
                    join_space(&r.optional_path), encode_bools(&r.boolean_values),
                    r.rule_kind.to_string(), r.source, r.target, r.class, join_space(&r.perms),
                ],
            )?;
        }
        for r in &records.tas {
            tx.execute(
                "INSERT INTO typeattributes (file, string, optional, booleanvalue, attr, members, is_logical)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    r.file, r.string,
                    join_space(&r.optional_path), encode_bools(&r.boolean_values),
                    r.attr, join_space(&r.members), r.is_logical as i64,
                ],
            )?;
        }
        for r in &records.tt {
            tx.execute(
                "INSERT INTO typetransitions (file, string, optional, booleanvalue, subject, source, class, target, filename)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    r.file, r.string,
                    join_space(&r.optional_path), encode_bools(&r.boolean_values),
                    r.subject, r.source, r.class, r.target, r.filename,
                ],
            )?;
        }

        tx.execute(
            "INSERT INTO files (path, mtime_us) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET mtime_us = excluded.mtime_us",
            params![path, mtime_us],
        )?;

        tx.commit()?;
        info!("refreshed {path}: {} TE, {} TAS, {} TT records", records.te.len(), records.tas.len(), records.tt.len());
        Ok(())
    }

    fn file_fresh(&self, path: &str, mtime_us: i64) -> Result<bool> {
        let stored: Option<i64> = self
            .conn
            .query_row("SELECT mtime_us FROM files WHERE path = ?1", params![path], |r| r.get(0))
            .optional()?;
        Ok(stored == Some(mtime_us))
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM files")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn query_te(&self, filters: &Filters) -> Result<Vec<TERule>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file, string, optional, booleanvalue, rule_kind, source, target, class, perms FROM te_rules")?;
        let rows = stmt.query_map([], |row| {
            Ok(TERule {
                file: row.get(0)?,
                string: row.get(1)?,
                optional_path: split_space(&row.get::<_, String>(2)?),
                boolean_values: decode_bools(&row.get::<_, String>(3)?),
                rule_kind: row.get::<_, String>(4)?.parse().unwrap(),
                source: row.get(5)?,
                target: row.get(6)?,
                class: row.get(7)?,
                perms: split_space(&row.get::<_, String>(8)?),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            let r = row?;
            if filters.matches_te(&r) {
                out.push(r);
            }
        }
        Ok(out)
    }

    fn query_tt(&self, filters: &Filters) -> Result<Vec<Typetransition>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file, string, optional, booleanvalue, subject, source, class, target, filename FROM typetransitions")?;
        let rows = stmt.query_map([], |row| {
            Ok(Typetransition {
                file: row.get(0)?,
                string: row.get(1)?,
                optional_path: split_space(&row.get::<_, String>(2)?),
                boolean_values: decode_bools(&row.get::<_, String>(3)?),
                subject: row.get(4)?,
                source: row.get(5)?,
                class: row.get(6)?,
                target: row.get(7)?,
                filename: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            let r = row?;
            if filters.matches_tt(&r) {
                out.push(r);
            }
        }
        Ok(out)
    }

    fn query_tas(&self, filters: &Filters) -> Result<Vec<TASet>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file, string, optional, booleanvalue, attr, members, is_logical FROM typeattributes")?;
        let rows = stmt.query_map([], |row| {
            Ok(TASet {
                file: row.get(0)?,
                string: row.get(1)?,
                optional_path: split_space(&row.get::<_, String>(2)?),
                boolean_values: decode_bools(&row.get::<_, String>(3)?),
                attr: row.get(4)?,
                members: split_space(&row.get::<_, String>(5)?),
                is_logical: row.get::<_, i64>(6)? != 0,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            let r = row?;
            if filters.matches_tas(&r) {
                out.push(r);
            }
        }
        Ok(out)
    }
}
