//! Error types for CIL s-expression parsing

use std::fmt;

/// Error produced when the input does not match the s-expression grammar
///
/// The parser is not error-recovering: it fails with the first mismatch it
/// encounters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset into the input where parsing failed
    pub offset: usize,
    /// Human-readable description of what was expected at `offset`
    pub expected: String,
}

impl ParseError {
    pub fn new(offset: usize, expected: impl Into<String>) -> Self {
        Self {
            offset,
            expected: expected.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at byte {}: expected {}",
            self.offset, self.expected
        )
    }
}

impl std::error::Error for ParseError {}

/// Result type for CIL parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
