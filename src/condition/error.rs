//! Compile errors for the condition language
//!
//! Every variant is a caller-side validation failure; positions are byte
//! offsets into the original expression.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Empty condition")]
    Empty,

    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("Cannot mix '&&' and '||' at position {position} without parentheses")]
    MixedOperator { position: usize },

    #[error("Missing {expected} at position {position}")]
    MissingOperand {
        position: usize,
        expected: &'static str,
    },

    #[error("Unexpected '{found}' at position {position}")]
    UnexpectedToken { position: usize, found: String },

    #[error("Unbalanced parenthesis at position {position}")]
    UnbalancedParenthesis { position: usize },
}

impl ConditionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ConditionError::Empty => "EMPTY_CONDITION",
            ConditionError::UnterminatedString { .. } => "UNTERMINATED_STRING",
            ConditionError::MixedOperator { .. } => "MIXED_OPERATOR",
            ConditionError::MissingOperand { .. } => "MISSING_OPERAND",
            ConditionError::UnexpectedToken { .. } => "UNEXPECTED_TOKEN",
            ConditionError::UnbalancedParenthesis { .. } => "UNBALANCED_PARENTHESIS",
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            ConditionError::Empty => None,
            ConditionError::UnterminatedString { position }
            | ConditionError::MixedOperator { position }
            | ConditionError::MissingOperand { position, .. }
            | ConditionError::UnexpectedToken { position, .. }
            | ConditionError::UnbalancedParenthesis { position } => Some(*position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position() {
        assert_eq!(ConditionError::Empty.position(), None);
        assert_eq!(
            ConditionError::MissingOperand {
                position: 4,
                expected: "field name"
            }
            .position(),
            Some(4)
        );
    }
}
