//! # cil-data
//!
//! Record model and semantic normalizer for a curated subset of SELinux CIL
//! policy statements.
//!
//! Given a [`cil_parser::Node`] tree for one file, [`normalizer::normalize`]
//! walks it, flattening `optional`/`booleanif` nesting into an explicit
//! [`context::Context`], deduplicating repeated statements, and classifying
//! recognized heads into three typed record streams: [`records::TERule`],
//! [`records::TASet`], and [`records::Typetransition`].
//!
//! This crate has no notion of persistence or querying — see `cil-index`
//! for the store and query engine built on top of these records.

pub mod canonical;
pub mod context;
pub mod error;
pub mod normalizer;
pub mod records;

pub use context::Context;
pub use error::{NormalizerError, Result};
pub use normalizer::{normalize, Normalized};
pub use records::{RuleKind, TASet, TERule, Typetransition};
