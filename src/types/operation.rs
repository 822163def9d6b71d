//! Bulk operation types
//!
//! A `BulkOperation` is the tracked unit of work for one import, export or
//! bulk-edit action. The state machine that mutates it lives in
//! `services::tracker`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::row::FieldError;

// ==========================================================================
// Tests First (TDD)
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_status_serializes_lowercase() {
        let json = serde_json::to_string(&OperationStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn test_operation_kind_bulk_edit_serializes_snake_case() {
        let json = serde_json::to_string(&OperationKind::BulkEdit).unwrap();
        assert_eq!(json, "\"bulk_edit\"");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Processing.is_terminal());
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_bulk_operation_new_is_pending_and_empty() {
        let op = BulkOperation::new(OperationKind::Import);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.progress, 0);
        assert!(op.completed_at.is_none());
        assert!(!op.id.is_nil());
    }

    #[test]
    fn test_bulk_operation_serializes_to_camel_case() {
        let op = BulkOperation::new(OperationKind::Export);
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("processedRecords"));
        assert!(json.contains("successCount"));
        assert!(json.contains("startedAt"));
        assert!(!json.contains("failure"));
    }

    #[test]
    fn test_operation_submit_response_serializes() {
        let response = OperationSubmitResponse {
            operation_id: Uuid::nil(),
            kind: OperationKind::Import,
            message: "Import started".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("operationId"));
        assert!(json.contains("\"import\""));
    }
}

// ==========================================================================
// Operation Types
// ==========================================================================

/// Kind of bulk action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Import,
    Export,
    BulkEdit,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Import => "import",
            OperationKind::Export => "export",
            OperationKind::BulkEdit => "bulk_edit",
        }
    }
}

/// Operation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Processing => "processing",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
            OperationStatus::Cancelled => "cancelled",
        }
    }
}

/// Category of an operation-scoped failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// File too large, wrong type, unparseable, invalid request
    InputRejected,
    /// Record store unreachable or host I/O failure
    Systemic,
}

/// Why an operation ended in `failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl OperationFailure {
    pub fn input_rejected(message: impl Into<String>) -> Self {
        Self {
            category: FailureCategory::InputRejected,
            message: message.into(),
        }
    }

    pub fn systemic(message: impl Into<String>) -> Self {
        Self {
            category: FailureCategory::Systemic,
            message: message.into(),
        }
    }
}

/// Tracked unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperation {
    pub id: Uuid,
    pub kind: OperationKind,
    pub status: OperationStatus,
    /// Records targeted for submission (valid rows for imports)
    pub total_records: u32,
    /// Records attempted so far
    pub processed_records: u32,
    pub success_count: u32,
    /// Attempted records the store rejected
    pub error_count: u32,
    /// Import rows blocked by validation and never submitted
    pub skipped_rows: u32,
    /// Issues ordered by row: validation errors of skipped rows and per-record
    /// persistence errors
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<OperationFailure>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// 0..=100
    pub progress: u8,
}

impl BulkOperation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: OperationStatus::Pending,
            total_records: 0,
            processed_records: 0,
            success_count: 0,
            error_count: 0,
            skipped_rows: 0,
            errors: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            completed_at: None,
            progress: 0,
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }
}

/// Response when a long-running operation is started
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSubmitResponse {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub message: String,
}

/// Reference to an existing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRef {
    pub operation_id: Uuid,
}

/// Result of cancel/dismiss
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationActionResponse {
    pub success: bool,
    pub message: String,
    pub operation_id: Uuid,
}

/// Status snapshot published while an operation runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatusUpdate {
    pub operation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation: BulkOperation,
}

impl OperationStatusUpdate {
    pub fn new(operation: BulkOperation) -> Self {
        Self {
            operation_id: operation.id,
            timestamp: Utc::now(),
            operation,
        }
    }
}
