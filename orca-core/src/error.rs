//! Structured errors
//!
//! Errors are values returned to the caller, never panics. Formula and
//! variable errors are shown next to the formula input; persistence errors
//! drive the reload-and-notify path of the stage coordinator.

use crate::{ItemId, Number, NumberError, StageId, VariableId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard error codes (machine-readable)
pub mod codes {
    pub const UNRESOLVED_REFERENCE: &str = "UNRESOLVED_REFERENCE";
    pub const INVALID_EXPRESSION: &str = "INVALID_EXPRESSION";
    pub const DUPLICATE_NAME: &str = "DUPLICATE_NAME";
    pub const INVALID_NAME: &str = "INVALID_NAME";
    pub const INVALID_MOVE: &str = "INVALID_MOVE";
    pub const VARIABLE_NOT_FOUND: &str = "VARIABLE_NOT_FOUND";
    pub const STAGE_NOT_FOUND: &str = "STAGE_NOT_FOUND";
    pub const DUPLICATE_STAGE: &str = "DUPLICATE_STAGE";
    pub const ITEM_NOT_FOUND: &str = "ITEM_NOT_FOUND";
    pub const REORDER_IN_PROGRESS: &str = "REORDER_IN_PROGRESS";
    pub const INVALID_QUANTITY: &str = "INVALID_QUANTITY";
    pub const PERSISTENCE: &str = "PERSISTENCE";
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrcaError {
    /// The formula names something that is neither a number nor a bound variable
    #[error("Unresolved reference: {token}")]
    UnresolvedReference { token: String },

    /// Malformed syntax, division by zero or an unrepresentable result
    #[error("Invalid expression: {reason}")]
    InvalidExpression { reason: String },

    #[error("Variable name already in use: {name}")]
    DuplicateName { name: String },

    #[error("Invalid variable name: '{name}'")]
    InvalidName { name: String },

    /// Stage move that targets the node itself or one of its descendants
    #[error("Invalid move: {reason}")]
    InvalidMove { reason: String },

    #[error("Unknown variable: {0}")]
    VariableNotFound(VariableId),

    #[error("Unknown stage: {0}")]
    StageNotFound(StageId),

    #[error("Stage already present: {0}")]
    DuplicateStage(StageId),

    #[error("Unknown line item: {0}")]
    ItemNotFound(ItemId),

    #[error("Stage changes are still being saved")]
    ReorderInProgress,

    #[error("Quantity must be greater than zero, got {0}")]
    InvalidQuantity(Number),

    /// External store call failed; `failed` counts the calls that did not go through
    #[error("Persistence failure: {message}")]
    Persistence { message: String, failed: usize },
}

impl OrcaError {
    // ========== Common Error Constructors ==========

    pub fn unresolved(token: impl Into<String>) -> Self {
        Self::UnresolvedReference { token: token.into() }
    }

    pub fn invalid_expression(reason: impl Into<String>) -> Self {
        Self::InvalidExpression { reason: reason.into() }
    }

    pub fn invalid_move(reason: impl Into<String>) -> Self {
        Self::InvalidMove { reason: reason.into() }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into(), failed: 1 }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvedReference { .. } => codes::UNRESOLVED_REFERENCE,
            Self::InvalidExpression { .. } => codes::INVALID_EXPRESSION,
            Self::DuplicateName { .. } => codes::DUPLICATE_NAME,
            Self::InvalidName { .. } => codes::INVALID_NAME,
            Self::InvalidMove { .. } => codes::INVALID_MOVE,
            Self::VariableNotFound(_) => codes::VARIABLE_NOT_FOUND,
            Self::StageNotFound(_) => codes::STAGE_NOT_FOUND,
            Self::DuplicateStage(_) => codes::DUPLICATE_STAGE,
            Self::ItemNotFound(_) => codes::ITEM_NOT_FOUND,
            Self::ReorderInProgress => codes::REORDER_IN_PROGRESS,
            Self::InvalidQuantity(_) => codes::INVALID_QUANTITY,
            Self::Persistence { .. } => codes::PERSISTENCE,
        }
    }

    /// Suggestion for fixing the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::UnresolvedReference { token } => {
                Some(format!("Define a variable named '{}' or check spelling", token))
            }
            Self::InvalidExpression { .. } => Some("Check formula syntax".to_string()),
            Self::DuplicateName { name } => Some(format!("Pick a name other than '{}'", name)),
            Self::InvalidName { .. } => {
                Some("Use letters, digits and underscores, starting with a letter".to_string())
            }
            Self::ReorderInProgress => Some("Wait for the previous change to finish".to_string()),
            Self::InvalidQuantity(_) => Some("Enter a quantity greater than zero".to_string()),
            Self::Persistence { .. } => Some("The stage list was reloaded; try again".to_string()),
            _ => None,
        }
    }

    /// True for errors that leave the persisted state untouched and only
    /// need inline feedback next to the input
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. }
                | Self::InvalidExpression { .. }
                | Self::DuplicateName { .. }
                | Self::InvalidName { .. }
                | Self::InvalidQuantity(_)
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
            suggestion: self.suggestion(),
        }
    }
}

/// Serializable error view for the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<NumberError> for OrcaError {
    fn from(err: NumberError) -> Self {
        match err {
            NumberError::ParseError(s) => Self::invalid_expression(format!("malformed number '{}'", s)),
            NumberError::DivisionByZero => Self::invalid_expression("division by zero"),
        }
    }
}
