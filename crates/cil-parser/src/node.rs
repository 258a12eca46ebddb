//! The parsed s-expression tree
//!
//! A [`Node`] is either an atom (carried verbatim, quotes included for
//! strings) or a list of child nodes. This mirrors the shape of CIL's own
//! surface syntax closely enough that re-serializing a tree with [`Node`]'s
//! `Display` impl and re-parsing it produces an equal tree (see the parser
//! round-trip tests).

use std::fmt;

/// A single node of a parsed CIL s-expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A symbol or quoted string, carried as its verbatim source text
    ///
    /// Quoted strings keep their surrounding `"` characters so callers can
    /// distinguish them from symbols by inspecting the first byte.
    Atom(String),
    /// A parenthesized list of child nodes
    List(Vec<Node>),
}

impl Node {
    /// Returns the verbatim atom text, or `None` if this is a list
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Node::Atom(s) => Some(s),
            Node::List(_) => None,
        }
    }

    /// Returns the child list, or `None` if this is an atom
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::Atom(_) => None,
            Node::List(items) => Some(items),
        }
    }

    /// True iff this atom is a quoted string (its verbatim text starts with `"`)
    pub fn is_quoted_string(&self) -> bool {
        self.as_atom().is_some_and(|s| s.starts_with('"'))
    }

    /// The head token of a list node: the first child's atom text
    ///
    /// Returns `None` for an empty list or for an atom node.
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_atom()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Atom(s) => write!(f, "{s}"),
            Node::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}
