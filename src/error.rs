//! Error taxonomy shared by the schema pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// Malformed notation. Carries every diagnostic collected for the document.
    #[error("Syntax error: {}", .0.join("; "))]
    Syntax(Vec<String>),

    /// A model with outstanding validation errors was handed to a stage
    /// that requires a valid one.
    #[error("Invalid {side} schema: {}", .errors.join("; "))]
    Validation { side: String, errors: Vec<String> },

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("Unsupported type '{type_name}' on {table}.{column}")]
    UnsupportedType {
        table: String,
        column: String,
        type_name: String,
    },

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Execution failed at step {step}: {message}")]
    Execution { step: usize, message: String },
}

impl SchemaError {
    pub fn validation(side: &str, errors: Vec<String>) -> Self {
        Self::Validation {
            side: side.to_string(),
            errors,
        }
    }
}

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_joins_diagnostics() {
        let err = SchemaError::Syntax(vec!["line 1: a".into(), "line 2: b".into()]);
        assert_eq!(err.to_string(), "Syntax error: line 1: a; line 2: b");
    }

    #[test]
    fn test_validation_error_names_side() {
        let err = SchemaError::validation("old", vec!["Table 'x' has no columns".into()]);
        assert!(err.to_string().starts_with("Invalid old schema"));
    }
}
