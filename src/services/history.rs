//! Operation history
//!
//! Keeps the most recent terminal operations in memory, optionally backed by
//! a JSON file so history survives worker restarts.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{BulkOperation, OperationFailure, OperationKind, OperationStatus};

const MAX_HISTORY_SIZE: usize = 100;

/// Summary of a finished operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHistoryEntry {
    pub id: Uuid,
    pub session_id: Uuid,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_records: u32,
    pub success_count: u32,
    pub error_count: u32,
    pub skipped_rows: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<OperationFailure>,
}

impl OperationHistoryEntry {
    /// `None` for operations that have not reached a terminal state
    pub fn from_operation(session_id: Uuid, op: &BulkOperation) -> Option<Self> {
        let completed_at = op.completed_at?;
        Some(Self {
            id: op.id,
            session_id,
            kind: op.kind,
            status: op.status,
            started_at: op.started_at,
            completed_at,
            duration_ms: op.duration_ms().unwrap_or_default(),
            total_records: op.total_records,
            success_count: op.success_count,
            error_count: op.error_count,
            skipped_rows: op.skipped_rows,
            failure: op.failure.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHistoryResponse {
    pub operations: Vec<OperationHistoryEntry>,
    pub total: usize,
}

/// Bounded, most-recent-first history
#[derive(Clone)]
pub struct OperationHistory {
    entries: Arc<RwLock<VecDeque<OperationHistoryEntry>>>,
    file: Option<PathBuf>,
}

impl OperationHistory {
    /// In-memory only
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(MAX_HISTORY_SIZE))),
            file: None,
        }
    }

    /// Backed by `path`; existing entries are loaded now
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut deque = VecDeque::with_capacity(MAX_HISTORY_SIZE);
        if let Some(loaded) = Self::load_from_disk(&path) {
            deque.extend(loaded.into_iter().take(MAX_HISTORY_SIZE));
            info!("Loaded {} operation history entries from {}", deque.len(), path.display());
        }
        Self {
            entries: Arc::new(RwLock::new(deque)),
            file: Some(path),
        }
    }

    /// Record a finished operation; ignored unless it is terminal
    pub fn record(&self, session_id: Uuid, op: &BulkOperation) {
        let Some(entry) = OperationHistoryEntry::from_operation(session_id, op) else {
            warn!("Not recording operation {} in history: status {}", op.id, op.status.as_str());
            return;
        };

        let mut entries = self.entries.write();
        if entries.len() >= MAX_HISTORY_SIZE {
            entries.pop_back();
        }
        entries.push_front(entry);

        if let Some(path) = &self.file {
            Self::save_to_disk(path, &entries);
        }
    }

    /// Recent operations of one session
    pub fn recent_for_session(&self, session_id: Uuid, limit: usize) -> OperationHistoryResponse {
        let entries = self.entries.read();
        let operations: Vec<OperationHistoryEntry> = entries
            .iter()
            .filter(|e| e.session_id == session_id)
            .take(limit)
            .cloned()
            .collect();
        let total = operations.len();
        OperationHistoryResponse { operations, total }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn load_from_disk(path: &Path) -> Option<Vec<OperationHistoryEntry>> {
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<OperationHistoryEntry>>(&content) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!("Failed to parse operation history file: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read operation history file: {}", e);
                None
            }
        }
    }

    fn save_to_disk(path: &Path, entries: &VecDeque<OperationHistoryEntry>) {
        if let Some(dir) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Failed to create operation history directory: {}", e);
                return;
            }
        }
        let entries: Vec<&OperationHistoryEntry> = entries.iter().collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!("Failed to write operation history file: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize operation history: {}", e),
        }
    }
}
