//! Error types produced while normalizing a parsed CIL tree into records

use thiserror::Error;

/// Errors raised while walking a parsed CIL tree
#[derive(Debug, Error)]
pub enum NormalizerError {
    /// An s-expression head is not in the whitelist of recognized or
    /// silently-dropped CIL statements.
    ///
    /// The spec prefers loud failure over silent drift: any unrecognized
    /// head rejects the whole file.
    #[error("unknown statement head '{head}' in {file}")]
    UnknownHead { file: String, head: String },

    /// A whitelisted head had the wrong token arity for its expected shape.
    #[error("'{head}' in {file} has the wrong shape: {detail}")]
    ShapeAssert {
        file: String,
        head: String,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, NormalizerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_head_error_message_names_the_head_and_file() {
        let err = NormalizerError::UnknownHead {
            file: "a.cil".to_string(),
            head: "bogus".to_string(),
        };
        assert_eq!(err.to_string(), "unknown statement head 'bogus' in a.cil");
    }

    #[test]
    fn shape_assert_error_message_names_the_head_file_and_detail() {
        let err = NormalizerError::ShapeAssert {
            file: "a.cil".to_string(),
            head: "allow".to_string(),
            detail: "expected 4 tokens, got 3".to_string(),
        };
        assert_eq!(err.to_string(), "'allow' in a.cil has the wrong shape: expected 4 tokens, got 3");
    }
}
