//! Build-once forward/reverse attribute maps over the TAS record stream.
//!
//! `forward[attr]` holds every [`TASet`] whose `attr` field equals `attr`;
//! `reverse[member]` holds every `TASet` whose `members` contains `member`.
//! Logical TAS records (`is_logical`) contribute to neither map, since their
//! membership is not enumerable from the record alone.

use std::collections::HashSet;

use cil_data::TASet;
use indexmap::IndexMap;

/// An immutable, build-once index over a set of [`TASet`] records.
#[derive(Debug, Default)]
pub struct Index {
    forward: IndexMap<String, Vec<TASet>>,
    reverse: IndexMap<String, Vec<TASet>>,
}

impl Index {
    /// Build an index from the full TAS stream.
    pub fn build(tas: &[TASet]) -> Self {
        let mut forward: IndexMap<String, Vec<TASet>> = IndexMap::new();
        let mut reverse: IndexMap<String, Vec<TASet>> = IndexMap::new();

        for r in tas {
            if r.is_logical {
                continue;
            }
            forward.entry(r.attr.clone()).or_default().push(r.clone());
            for member in &r.members {
                reverse.entry(member.clone()).or_default().push(r.clone());
            }
        }

        Self { forward, reverse }
    }

    /// Every `TASet` whose `attr` equals `attr`.
    pub fn forward(&self, attr: &str) -> &[TASet] {
        self.forward.get(attr).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every `TASet` whose `members` contains `member`.
    pub fn reverse(&self, member: &str) -> &[TASet] {
        self.reverse.get(member).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attribute-expand a query symbol set (§4.5.1): a symbol may be a
    /// concrete type or an attribute, and the store records each TE rule's
    /// source/target exactly as written in the policy (sometimes an
    /// attribute, sometimes a concrete type). To match regardless of which
    /// form the query and the indexed rule used, expansion closes over both
    /// directions: for each symbol, add every attribute it is a member of,
    /// and every member of it (when it is itself an attribute).
    pub fn expand(&self, symbols: &HashSet<String>) -> HashSet<String> {
        let mut out = symbols.clone();
        for m in symbols {
            for r in self.reverse(m) {
                out.insert(r.attr.clone());
            }
            for r in self.forward(m) {
                out.extend(r.members.iter().cloned());
            }
        }
        out
    }

    /// For each symbol in `symbols`: the symbol itself, and every attribute
    /// it is a member of (used by `resolveattr` for the target side, and by
    /// `expand` conceptually; exposed directly so the query engine doesn't
    /// need to reimplement the walk).
    pub fn attrs_containing(&self, symbol: &str) -> impl Iterator<Item = &str> {
        self.reverse(symbol).iter().map(|r| r.attr.as_str())
    }

    /// For each symbol in `symbols`: the symbol itself, and every member of
    /// its own attribute expansion (used by `resolveattr` for the source
    /// side when `symbol` is itself an attribute).
    pub fn members_of(&self, attr: &str) -> impl Iterator<Item = &str> {
        self.forward(attr).iter().flat_map(|r| r.members.iter().map(String::as_str))
    }
}
