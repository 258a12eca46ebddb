//! The conditional-nesting context threaded through normalization
//!
//! CIL's `optional` and `booleanif` constructs nest arbitrarily; every rule
//! at any depth inherits the full chain of enclosing names and boolean
//! branch selections. Rather than carry this as mutable state during the
//! traversal, it is modeled as an explicit immutable struct passed by value
//! to each recursive call and extended (by cloning) whenever a new
//! `optional`/`booleanif` is entered.

use std::fmt;

/// Conditional-nesting context for one position in the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    /// Enclosing `optional` names and JSON-encoded boolean conditions, in
    /// outer-to-inner order.
    pub optional_path: Vec<String>,
    /// Enclosing `booleanif` branch selections (`true`/`false`), in
    /// outer-to-inner order.
    pub boolean_values: Vec<bool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this context with an `optional` name appended
    pub fn with_optional(&self, name: &str) -> Self {
        let mut path = self.optional_path.clone();
        path.push(name.to_string());
        Self {
            optional_path: path,
            boolean_values: self.boolean_values.clone(),
        }
    }

    /// Returns a copy of this context with a `booleanif` branch appended
    ///
    /// `condition` is the raw head-token text of the boolean condition;
    /// it is recorded JSON-encoded, per the canonical-string rendering rule.
    pub fn with_boolean_branch(&self, condition: &str, branch: bool) -> Self {
        let mut path = self.optional_path.clone();
        path.push(json_encode_string(condition));
        let mut values = self.boolean_values.clone();
        values.push(branch);
        Self {
            optional_path: path,
            boolean_values: values,
        }
    }
}

/// Minimal JSON string encoding: wrap in quotes, escape embedded quotes and backslashes
pub fn json_encode_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for Context {
    /// Renders as `ctx1 ctx2 ... ctxN`, interleaving optional names with
    /// `"<name>"==True|False` markers for boolean branches.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bool_idx = 0;
        for (i, ctx) in self.optional_path.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            if ctx.starts_with('"') {
                let value = self.boolean_values.get(bool_idx).copied().unwrap_or(false);
                bool_idx += 1;
                write!(f, "{ctx}=={}", if value { "True" } else { "False" })?;
            } else {
                write!(f, "{ctx}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_renders_as_empty_string() {
        assert_eq!(Context::new().to_string(), "");
    }

    #[test]
    fn with_optional_renders_the_bare_name() {
        let ctx = Context::new().with_optional("foo");
        assert_eq!(ctx.to_string(), "foo");
    }

    #[test]
    fn with_boolean_branch_renders_the_condition_and_value() {
        let ctx = Context::new().with_boolean_branch("x", true);
        assert_eq!(ctx.to_string(), "\"x\"==True");
    }

    #[test]
    fn nested_optional_and_boolean_context_matches_scenario_s3() {
        let ctx = Context::new().with_optional("foo").with_boolean_branch("x", true);
        assert_eq!(ctx.optional_path, vec!["foo".to_string(), "\"x\"".to_string()]);
        assert_eq!(ctx.boolean_values, vec![true]);
        assert_eq!(ctx.to_string(), "foo \"x\"==True");
    }

    #[test]
    fn json_encode_string_escapes_quotes_and_backslashes() {
        assert_eq!(json_encode_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
