//! # cil-parser
//!
//! A parser for SELinux CIL (Common Intermediate Language) policy modules'
//! s-expression surface syntax.
//!
//! This crate only covers the lexical/syntactic layer: tokenizing and
//! parsing CIL text into a tree of [`Node`]s. It has no notion of CIL's
//! statement semantics (`allow`, `typeattributeset`, ...) — that belongs to
//! the normalizer built on top of this tree.
//!
//! ```
//! use cil_parser::parse_exprs;
//!
//! let exprs = parse_exprs(r#"(allow httpd_t http_port_t (tcp_socket (name_bind)))"#).unwrap();
//! assert_eq!(exprs.len(), 1);
//! assert_eq!(exprs[0].head(), Some("allow"));
//! ```

mod error;
mod node;
mod parser;

pub use error::{ParseError, Result};
pub use node::Node;
pub use parser::parse_exprs;
