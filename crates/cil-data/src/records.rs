//! Strongly typed normalized record kinds
//!
//! Every record kind carries provenance (`file`, `string`) in addition to
//! its semantic fields. `string` is the canonical form used as the
//! dedup/display key (see [`crate::canonical`]).

use serde::{Deserialize, Serialize};
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};

/// The eight type-enforcement rule kinds CIL supports
#[derive(Serialize_enum_str, Deserialize_enum_str, Debug, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Allow,
    Auditallow,
    Dontaudit,
    Neverallow,
    Allowxperm,
    Auditallowxperm,
    Dontauditxperm,
    Neverallowxperm,
    #[serde(other)]
    Unknown(String),
}

impl RuleKind {
    /// The eight recognized kinds, in the order the spec lists them
    pub const ALL: [&'static str; 8] = [
        "allow",
        "auditallow",
        "dontaudit",
        "neverallow",
        "allowxperm",
        "auditallowxperm",
        "dontauditxperm",
        "neverallowxperm",
    ];

    pub fn from_head(head: &str) -> Option<Self> {
        if Self::ALL.contains(&head) {
            Some(head.parse().expect("head is in ALL"))
        } else {
            None
        }
    }
}

/// A type-enforcement rule: `(kind source target (class (perm ...)))`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TERule {
    pub rule_kind: RuleKind,
    pub source: String,
    pub target: String,
    pub class: String,
    pub perms: Vec<String>,
    pub optional_path: Vec<String>,
    pub boolean_values: Vec<bool>,
    pub file: String,
    pub string: String,
}

/// A type-attribute-set: `(typeattributeset attr members-or-logic)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TASet {
    pub attr: String,
    pub members: Vec<String>,
    /// True when `members-or-logic` began with `and`/`or`/`not`: the
    /// expression is recorded but `members` is intentionally left empty.
    pub is_logical: bool,
    pub optional_path: Vec<String>,
    pub boolean_values: Vec<bool>,
    pub file: String,
    pub string: String,
}

/// A type-transition: `(typetransition subject source class target [filename])`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typetransition {
    pub subject: String,
    pub source: String,
    pub class: String,
    pub target: String,
    /// Present iff the original statement had the six-token filename form
    pub filename: Option<String>,
    pub optional_path: Vec<String>,
    pub boolean_values: Vec<bool>,
    pub file: String,
    pub string: String,
}
