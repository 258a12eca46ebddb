//! The query engine: attribute expansion, TE/TT/TAS search, `resolveattr`,
//! and from-diff comparison (§4.5).

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use cil_data::{normalize, RuleKind, TERule, Typetransition};
use cil_parser::parse_exprs;
use tracing::debug;

use crate::errors::{IndexError, Result};
use crate::index::Index;
use crate::store::{Filters, Store};

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Inputs to a TE search (§4.5.2), pre-expansion.
#[derive(Debug, Default, Clone)]
pub struct TeSearchInput {
    pub source: HashSet<String>,
    pub target: HashSet<String>,
    pub not_source: HashSet<String>,
    pub not_target: HashSet<String>,
    pub class: Option<String>,
    pub rule_kind: Option<RuleKind>,
    pub perms: Option<HashSet<String>>,
    pub excluded_file: Option<String>,
    pub excluded_basename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TeSearchResult {
    pub matches: Vec<(String, String)>,
    pub got_all: bool,
    pub got_any: bool,
    pub missing: HashSet<String>,
}

fn expand_or_none(index: &Index, set: &HashSet<String>) -> Option<HashSet<String>> {
    if set.is_empty() {
        return None;
    }
    let expanded = index.expand(set);
    Some(expanded)
}

/// TE search with permission-set arithmetic (§4.5.2).
pub fn te_search(store: &dyn Store, index: &Index, input: &TeSearchInput) -> Result<TeSearchResult> {
    debug!(?input.source, ?input.target, "expanding TE search filters");
    let filters = Filters {
        file: None,
        source: expand_or_none(index, &input.source),
        target: expand_or_none(index, &input.target),
        not_source: expand_or_none(index, &input.not_source),
        not_target: expand_or_none(index, &input.not_target),
        class: input.class.clone(),
        rule_kind: input.rule_kind.clone(),
        subject: None,
        perms: None,
        filename: None,
        excluded_file: input.excluded_file.clone(),
    };

    let mut matches = Vec::new();
    let mut got_any = false;
    let mut missing: HashSet<String> = input.perms.clone().unwrap_or_default();

    for r in store.query_te(&filters)? {
        if let Some(bn) = &input.excluded_basename {
            if basename(&r.file) == *bn {
                continue;
            }
        }

        if let Some(wanted) = &input.perms {
            let got: HashSet<String> = r.perms.iter().cloned().collect();
            if wanted.is_disjoint(&got) {
                continue;
            }
            got_any = true;
            missing = missing.difference(&got).cloned().collect();
        } else {
            got_any = true;
        }
        matches.push((r.file.clone(), r.string.clone()));
    }

    Ok(TeSearchResult {
        matches,
        got_all: missing.is_empty(),
        got_any,
        missing,
    })
}

/// The verdict of a single typetransition match (§4.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtVerdict {
    True,
    Partial,
    More,
    False,
}

impl TtVerdict {
    fn single(query_filename: Option<&str>, record_filename: Option<&str>) -> Self {
        match (query_filename, record_filename) {
            (None, None) => TtVerdict::True,
            (None, Some(_)) => TtVerdict::Partial,
            (Some(_), None) => TtVerdict::More,
            (Some(q), Some(r)) if q == r => TtVerdict::True,
            (Some(_), Some(_)) => TtVerdict::False,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TtSearchInput {
    pub source: HashSet<String>,
    pub target: HashSet<String>,
    pub not_source: HashSet<String>,
    pub not_target: HashSet<String>,
    pub class: Option<String>,
    pub subject: Option<String>,
    pub filename: Option<String>,
    pub excluded_file: Option<String>,
    pub excluded_basename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TtSearchResult {
    pub matches: Vec<(String, String)>,
    pub verdict: TtVerdict,
}

/// TT search with the TRUE-dominates verdict table (§4.5.3).
pub fn tt_search(store: &dyn Store, index: &Index, input: &TtSearchInput) -> Result<TtSearchResult> {
    let filters = Filters {
        file: None,
        source: expand_or_none(index, &input.source),
        target: expand_or_none(index, &input.target),
        not_source: expand_or_none(index, &input.not_source),
        not_target: expand_or_none(index, &input.not_target),
        class: input.class.clone(),
        rule_kind: None,
        subject: input.subject.clone(),
        perms: None,
        filename: None,
        excluded_file: input.excluded_file.clone(),
    };

    let mut matches = Vec::new();
    let mut best = TtVerdict::False;

    for r in store.query_tt(&filters)? {
        if let Some(bn) = &input.excluded_basename {
            if basename(&r.file) == *bn {
                continue;
            }
        }

        let verdict = TtVerdict::single(input.filename.as_deref(), r.filename.as_deref());
        match verdict {
            TtVerdict::True => best = TtVerdict::True,
            TtVerdict::Partial | TtVerdict::More if best != TtVerdict::True => best = verdict,
            _ => {}
        }
        matches.push((r.file.clone(), r.string.clone()));
    }

    Ok(TtSearchResult { matches, verdict: best })
}

/// `search_taset` (§4.5.4): TAS records matching an optional exact `attr`
/// and/or an optional exact member.
pub fn search_taset(store: &dyn Store, source: Option<&str>, target: Option<&str>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for r in store.query_tas(&Filters::default())? {
        let source_ok = source.is_none_or(|s| s == r.attr);
        let target_ok = target.is_none_or(|t| r.members.iter().any(|m| m == t));
        if source_ok && target_ok {
            out.push((r.file.clone(), r.string.clone()));
        }
    }
    Ok(out)
}

/// `resolveattr` (§4.5.4): the sorted set of symbols reachable from the
/// expanded source/target inputs via attribute membership.
pub fn resolveattr(index: &Index, source: &HashSet<String>, target: &HashSet<String>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for s in index.expand(source) {
        out.insert(s.clone());
        for a in index.attrs_containing(&s) {
            out.insert(a.to_string());
        }
    }
    for t in index.expand(target) {
        out.insert(t.clone());
        for m in index.members_of(&t) {
            out.insert(m.to_string());
        }
    }
    out
}

fn format_te_rule(r: &TERule, missing: &HashSet<String>) -> String {
    let perms: Vec<String> = r
        .perms
        .iter()
        .map(|p| if missing.contains(p) { format!("-{p}") } else { p.clone() })
        .collect();
    format!("({} {} {} ({} ({})))", r.rule_kind, r.source, r.target, r.class, perms.join(" "))
}

fn format_tt_rule(r: &Typetransition) -> String {
    match &r.filename {
        Some(f) => format!("(typetransition {} {} {} \"{}\" {})", r.subject, r.source, r.class, f, r.target),
        None => format!("(typetransition {} {} {} {})", r.subject, r.source, r.class, r.target),
    }
}

/// One line of from-diff output (§4.5.5).
pub struct FromDiffReport {
    pub lines: Vec<String>,
}

/// Compare every TE rule and typetransition in `from_file_contents` against
/// the indexed store, excluding the from-file itself (by path and basename)
/// so a file is never used to prove itself.
pub fn from_diff(store: &dyn Store, index: &Index, from_path: &str, from_file_contents: &str) -> Result<FromDiffReport> {
    let exprs = parse_exprs(from_file_contents).map_err(|source| IndexError::Parse {
        file: from_path.to_string(),
        source,
    })?;
    let normalized = normalize(from_path, &exprs)?;
    let bn = basename(from_path);

    let mut lines = Vec::new();

    for r in &normalized.te {
        let input = TeSearchInput {
            source: [r.source.clone()].into_iter().collect(),
            target: [r.target.clone()].into_iter().collect(),
            class: Some(r.class.clone()),
            rule_kind: Some(r.rule_kind.clone()),
            perms: Some(r.perms.iter().cloned().collect()),
            excluded_file: Some(from_path.to_string()),
            excluded_basename: Some(bn.clone()),
            ..Default::default()
        };
        let result = te_search(store, index, &input)?;
        let status = if result.got_all {
            "found"
        } else if result.got_any {
            "some"
        } else {
            "no"
        };
        lines.push(format!("# {status}: {}", format_te_rule(r, &result.missing)));
    }

    for r in &normalized.tt {
        let input = TtSearchInput {
            source: [r.source.clone()].into_iter().collect(),
            target: [r.target.clone()].into_iter().collect(),
            class: Some(r.class.clone()),
            subject: Some(r.subject.clone()),
            filename: r.filename.clone(),
            excluded_file: Some(from_path.to_string()),
            excluded_basename: Some(bn.clone()),
            ..Default::default()
        };
        let result = tt_search(store, index, &input)?;
        let status = match result.verdict {
            TtVerdict::True => "found",
            TtVerdict::Partial => "partial",
            TtVerdict::More => "more",
            TtVerdict::False => "no",
        };
        lines.push(format!("# {status}: {}", format_tt_rule(r)));
    }

    for _ in &normalized.tas {
        lines.push(format!("# skipping unhandled head 'typeattributeset' in {from_path}"));
    }

    Ok(FromDiffReport { lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use cil_data::{Normalized, TASet};

    fn te(kind: RuleKind, source: &str, target: &str, class: &str, perms: &[&str], file: &str) -> TERule {
        let string = format!("({kind} {source} {target} ({class} ({})))", perms.join(" "));
        TERule {
            rule_kind: kind,
            source: source.to_string(),
            target: target.to_string(),
            class: class.to_string(),
            perms: perms.iter().map(|s| s.to_string()).collect(),
            optional_path: Vec::new(),
            boolean_values: Vec::new(),
            file: file.to_string(),
            string,
        }
    }

    fn tas(attr: &str, members: &[&str], file: &str) -> TASet {
        TASet {
            attr: attr.to_string(),
            members: members.iter().map(|s| s.to_string()).collect(),
            is_logical: false,
            optional_path: Vec::new(),
            boolean_values: Vec::new(),
            file: file.to_string(),
            string: format!("(typeattributeset {attr} (...))"),
        }
    }

    #[rstest::rstest]
    #[case(None, None, TtVerdict::True)]
    #[case(None, Some("\"bin\""), TtVerdict::Partial)]
    #[case(Some("\"bin\""), None, TtVerdict::More)]
    #[case(Some("\"bin\""), Some("\"bin\""), TtVerdict::True)]
    #[case(Some("\"bin\""), Some("\"sbin\""), TtVerdict::False)]
    fn tt_verdict_single_matches_the_verdict_table(
        #[case] query_filename: Option<&str>,
        #[case] record_filename: Option<&str>,
        #[case] expected: TtVerdict,
    ) {
        assert_eq!(TtVerdict::single(query_filename, record_filename), expected);
    }

    #[test]
    fn te_search_exact_match_with_no_perms_filter() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let records = Normalized {
            te: vec![te(RuleKind::Allow, "httpd_t", "http_port_t", "tcp_socket", &["name_bind"], "a.cil")],
            tas: Vec::new(),
            tt: Vec::new(),
        };
        store.upsert_file("a.cil", 1, &records).unwrap();
        let index = Index::build(&[]);

        let input = TeSearchInput {
            source: ["httpd_t".to_string()].into_iter().collect(),
            target: ["http_port_t".to_string()].into_iter().collect(),
            class: Some("tcp_socket".to_string()),
            rule_kind: Some(RuleKind::Allow),
            perms: Some(["name_bind".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let result = te_search(&store, &index, &input).unwrap();
        assert!(result.got_all);
        assert_eq!(result.matches.len(), 1);
    }

    #[test]
    fn te_search_expands_attribute_source() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let records = Normalized {
            te: vec![te(RuleKind::Allow, "httpd_t", "http_port_t", "tcp_socket", &["name_bind"], "a.cil")],
            tas: vec![tas("domain", &["httpd_t"], "a.cil")],
            tt: Vec::new(),
        };
        store.upsert_file("a.cil", 1, &records).unwrap();
        let index = Index::build(&records.tas);

        let input = TeSearchInput {
            source: ["domain".to_string()].into_iter().collect(),
            target: ["http_port_t".to_string()].into_iter().collect(),
            class: Some("tcp_socket".to_string()),
            rule_kind: Some(RuleKind::Allow),
            ..Default::default()
        };
        let result = te_search(&store, &index, &input).unwrap();
        assert_eq!(result.matches.len(), 1);
        assert!(result.got_any);
    }

    #[test]
    fn te_search_reports_partial_permission_satisfaction() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let records = Normalized {
            te: vec![te(RuleKind::Allow, "t1", "t2", "c1", &["p1"], "a.cil")],
            tas: Vec::new(),
            tt: Vec::new(),
        };
        store.upsert_file("a.cil", 1, &records).unwrap();
        let index = Index::build(&[]);

        let input = TeSearchInput {
            source: ["t1".to_string()].into_iter().collect(),
            target: ["t2".to_string()].into_iter().collect(),
            class: Some("c1".to_string()),
            rule_kind: Some(RuleKind::Allow),
            perms: Some(["p1".to_string(), "p2".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let result = te_search(&store, &index, &input).unwrap();
        assert!(!result.got_all);
        assert!(result.got_any);
        assert_eq!(result.missing, ["p2".to_string()].into_iter().collect());
    }

    fn tt(subject: &str, source: &str, class: &str, target: &str, filename: Option<&str>, file: &str) -> Typetransition {
        Typetransition {
            subject: subject.to_string(),
            source: source.to_string(),
            class: class.to_string(),
            target: target.to_string(),
            filename: filename.map(str::to_string),
            optional_path: Vec::new(),
            boolean_values: Vec::new(),
            file: file.to_string(),
            string: format!("(typetransition {subject} {source} {class} {target})"),
        }
    }

    #[test]
    fn tt_search_true_when_filenames_match() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let records = Normalized {
            te: Vec::new(),
            tas: Vec::new(),
            tt: vec![tt("init_t", "bin_t", "file", "foo_t", Some("foo"), "a.cil")],
        };
        store.upsert_file("a.cil", 1, &records).unwrap();
        let index = Index::build(&[]);

        let input = TtSearchInput {
            source: ["bin_t".to_string()].into_iter().collect(),
            target: ["foo_t".to_string()].into_iter().collect(),
            class: Some("file".to_string()),
            subject: Some("init_t".to_string()),
            filename: Some("foo".to_string()),
            ..Default::default()
        };
        let result = tt_search(&store, &index, &input).unwrap();
        assert_eq!(result.verdict, TtVerdict::True);
    }

    #[test]
    fn tt_search_partial_when_query_omits_filename_present_on_record() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let records = Normalized {
            te: Vec::new(),
            tas: Vec::new(),
            tt: vec![tt("init_t", "bin_t", "file", "foo_t", Some("foo"), "a.cil")],
        };
        store.upsert_file("a.cil", 1, &records).unwrap();
        let index = Index::build(&[]);

        let input = TtSearchInput {
            source: ["bin_t".to_string()].into_iter().collect(),
            target: ["foo_t".to_string()].into_iter().collect(),
            class: Some("file".to_string()),
            subject: Some("init_t".to_string()),
            ..Default::default()
        };
        let result = tt_search(&store, &index, &input).unwrap();
        assert_eq!(result.verdict, TtVerdict::Partial);
    }

    #[test]
    fn tt_search_true_dominates_a_later_partial() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let records = Normalized {
            te: Vec::new(),
            tas: Vec::new(),
            tt: vec![
                tt("init_t", "bin_t", "file", "foo_t", Some("foo"), "a.cil"),
                tt("init_t", "bin_t", "file", "foo_t", Some("bar"), "b.cil"),
            ],
        };
        store.upsert_file("a.cil", 1, &records).unwrap();
        store.upsert_file("b.cil", 1, &records).unwrap();
        let index = Index::build(&[]);

        let input = TtSearchInput {
            source: ["bin_t".to_string()].into_iter().collect(),
            target: ["foo_t".to_string()].into_iter().collect(),
            class: Some("file".to_string()),
            subject: Some("init_t".to_string()),
            filename: Some("foo".to_string()),
            ..Default::default()
        };
        let result = tt_search(&store, &index, &input).unwrap();
        assert_eq!(result.verdict, TtVerdict::True);
    }

    #[test]
    fn resolveattr_includes_attributes_and_members() {
        let tasets = vec![tas("domain", &["httpd_t"], "a.cil")];
        let index = Index::build(&tasets);

        let source: HashSet<String> = ["httpd_t".to_string()].into_iter().collect();
        let target: HashSet<String> = ["domain".to_string()].into_iter().collect();
        let result = resolveattr(&index, &source, &target);

        assert!(result.contains("httpd_t"));
        assert!(result.contains("domain"));
    }

    #[test]
    fn from_diff_reports_some_for_partially_satisfied_perms() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let records = Normalized {
            te: vec![te(RuleKind::Allow, "t1", "t2", "c1", &["p1"], "a.cil")],
            tas: Vec::new(),
            tt: Vec::new(),
        };
        store.upsert_file("a.cil", 1, &records).unwrap();
        let index = Index::build(&[]);

        let report = from_diff(&store, &index, "q.cil", "(allow t1 t2 (c1 (p1 p2)))").unwrap();
        assert_eq!(report.lines, vec!["# some: (allow t1 t2 (c1 (p1 -p2)))".to_string()]);
    }
}
