//! In-memory record store
//!
//! Deterministic backend for development and tests. Enforces uniqueness of
//! (clientId, name, address) like the production property service and can be
//! taken offline to exercise systemic-failure paths.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{RecordStore, StoreError};
use crate::types::{ExportFilter, FieldUpdate, PropertyDraft, PropertyRecord};

const OFFLINE_MESSAGE: &str = "in-memory store is offline";

pub struct InMemoryRecordStore {
    records: Mutex<Vec<PropertyRecord>>,
    next_id: AtomicU64,
    offline: AtomicBool,
    /// Successful writes left before the store goes offline; negative = never
    writes_until_outage: AtomicI64,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            writes_until_outage: AtomicI64::new(-1),
        }
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(OFFLINE_MESSAGE.to_string()))
        } else {
            Ok(())
        }
    }

    /// Called before each write; trips the outage counter
    fn ensure_writable(&self) -> Result<(), StoreError> {
        self.ensure_online()?;
        let remaining = self.writes_until_outage.load(Ordering::SeqCst);
        if remaining == 0 {
            self.offline.store(true, Ordering::SeqCst);
            return Err(StoreError::Unavailable(OFFLINE_MESSAGE.to_string()));
        }
        if remaining > 0 {
            self.writes_until_outage.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn same_identity(a: &PropertyDraft, b: &PropertyDraft) -> bool {
        a.client_id == b.client_id
            && a.name.eq_ignore_ascii_case(&b.name)
            && a.address.eq_ignore_ascii_case(&b.address)
    }
}

/// Controls for exercising failure paths
#[cfg(test)]
impl InMemoryRecordStore {
    /// Store pre-populated with records (ids kept as given)
    pub fn with_records(records: Vec<PropertyRecord>) -> Self {
        let store = Self::new();
        store.next_id.store(records.len() as u64 + 1, Ordering::SeqCst);
        *store.records.lock() = records;
        store
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Go offline after `writes` more successful writes
    pub fn fail_after(&self, writes: u32) {
        self.writes_until_outage.store(writes as i64, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<PropertyRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn check_available(&self) -> Result<(), StoreError> {
        self.ensure_online()
    }

    async fn create(&self, draft: &PropertyDraft) -> Result<PropertyRecord, StoreError> {
        self.ensure_writable()?;

        let mut records = self.records.lock();
        if records.iter().any(|r| Self::same_identity(&r.draft, draft)) {
            return Err(StoreError::Conflict(format!(
                "property '{}' at '{}' already exists for client {}",
                draft.name, draft.address, draft.client_id
            )));
        }

        let now = Utc::now();
        let record = PropertyRecord {
            id: format!("prop-{:06}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            draft: draft.clone(),
            status: Default::default(),
            image_urls: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, updates: &[FieldUpdate]) -> Result<PropertyRecord, StoreError> {
        self.ensure_writable()?;

        let mut records = self.records.lock();
        let position = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = records[position].clone();
        for update in updates {
            update.apply(&mut updated);
        }

        let clash = records
            .iter()
            .enumerate()
            .any(|(i, r)| i != position && Self::same_identity(&r.draft, &updated.draft));
        if clash {
            return Err(StoreError::Conflict(format!(
                "another property '{}' at '{}' exists for client {}",
                updated.draft.name, updated.draft.address, updated.draft.client_id
            )));
        }

        records[position] = updated.clone();
        Ok(updated)
    }

    async fn list(&self, filter: &ExportFilter) -> Result<Vec<PropertyRecord>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
