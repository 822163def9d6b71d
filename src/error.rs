//! Pipeline error taxonomy
//!
//! Row-scoped problems (validation errors/warnings, per-record persistence
//! failures) are data: they travel as `FieldError` values inside previews and
//! operations. The types here cover operation-scoped failures only.

use thiserror::Error;
use uuid::Uuid;

use crate::services::tracker::TransitionError;

/// An upload refused before any row is classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputRejection {
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported file type '{0}', expected .csv, .xlsx, .xls or .ods")]
    UnsupportedExtension(String),

    #[error("file could not be parsed: {0}")]
    Unparseable(String),

    #[error("file has no header row")]
    MissingHeader,

    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("file has {rows} rows, the limit is {limit}")]
    TooManyRows { rows: usize, limit: usize },

    #[error("{0}")]
    InvalidRequest(String),
}

/// Operation-scoped pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input rejected: {0}")]
    InputRejected(#[from] InputRejection),

    #[error("record store unavailable: {0}")]
    Systemic(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation {0} not found")]
    OperationNotFound(Uuid),

    #[error("operation {0} belongs to another session")]
    NotOwner(Uuid),

    #[error("session already has operation {0} in progress")]
    SessionBusy(Uuid),

    #[error("operation {0} has no result yet")]
    NotReady(Uuid),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl PipelineError {
    /// Stable error code used in transport error responses.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InputRejected(_) => "INPUT_REJECTED",
            PipelineError::Systemic(_) => "STORE_UNAVAILABLE",
            PipelineError::Cancelled => "CANCELLED",
            PipelineError::OperationNotFound(_) => "NOT_FOUND",
            PipelineError::NotOwner(_) => "NOT_OWNER",
            PipelineError::SessionBusy(_) => "SESSION_BUSY",
            PipelineError::NotReady(_) => "NOT_READY",
            PipelineError::Transition(_) => "INTERNAL",
        }
    }

    /// Operation the error refers to, if any
    pub fn operation_id(&self) -> Option<Uuid> {
        match self {
            PipelineError::OperationNotFound(id)
            | PipelineError::NotOwner(id)
            | PipelineError::SessionBusy(id)
            | PipelineError::NotReady(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_rejection_converts_into_pipeline_error() {
        let err: PipelineError = InputRejection::TooLarge { size: 20, limit: 10 }.into();
        assert_eq!(err.code(), "INPUT_REJECTED");
        assert!(err.to_string().contains("20 bytes"));
    }

    #[test]
    fn test_codes_are_distinct_for_caller_facing_errors() {
        let id = Uuid::nil();
        let codes = [
            PipelineError::Systemic("down".into()).code(),
            PipelineError::OperationNotFound(id).code(),
            PipelineError::NotOwner(id).code(),
            PipelineError::SessionBusy(id).code(),
            PipelineError::NotReady(id).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
