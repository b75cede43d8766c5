//! In-process stores with the same row semantics as the Postgres ones.
//! They back the test-suite and `STORE_BACKEND=memory` demo runs.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;

use super::{codec, parse_departments, seed, InventoryStore, ReasonUpdate, RequisitionStore};
use crate::{
    errors::StoreError,
    models::{Department, InventoryItem, InventoryRecord, RequestStatus, Requisition, RequisitionRecord},
    utils::{credential_matches, hash_password},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MemoryInventoryStore {
    records: Mutex<Vec<InventoryRecord>>,
    system_config: Mutex<Option<String>>,
    offline: AtomicBool,
}

impl MemoryInventoryStore {
    pub fn new(records: Vec<InventoryRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn with_system_config(self, raw: impl Into<String>) -> Self {
        *lock(&self.system_config) = Some(raw.into());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("stock registry offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, StoreError> {
        self.check_online()?;
        let records = lock(&self.records).clone();
        Ok(crate::models::inventory::in_stock(records))
    }

    async fn fetch_departments(&self) -> Result<Vec<Department>, StoreError> {
        self.check_online()?;
        Ok(lock(&self.system_config)
            .as_deref()
            .map(parse_departments)
            .unwrap_or_default())
    }
}

pub struct MemoryRequisitionStore {
    records: Mutex<Vec<RequisitionRecord>>,
    config: Mutex<Option<String>>,
    default_admin_secret: String,
    schema_ready: AtomicBool,
    offline: AtomicBool,
    reject_writes: AtomicBool,
}

impl MemoryRequisitionStore {
    pub fn new(default_admin_secret: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            config: Mutex::new(None),
            default_admin_secret: default_admin_secret.into(),
            schema_ready: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Stores a raw row as-is, bypassing encoding.
    pub fn insert_record(&self, record: RequisitionRecord) {
        lock(&self.records).push(record);
    }

    pub fn records(&self) -> Vec<RequisitionRecord> {
        lock(&self.records).clone()
    }

    pub fn set_admin_credential(&self, value: impl Into<String>) {
        *lock(&self.config) = Some(value.into());
    }

    /// Fails every call with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fails writes only; reads keep working.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("requisitions store offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.check_online()?;
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("requisitions store rejected the write".to_string()));
        }
        Ok(())
    }

    fn with_record<F>(&self, id: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut RequisitionRecord),
    {
        let mut records = lock(&self.records);
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        apply(record);
        Ok(())
    }
}

#[async_trait]
impl RequisitionStore for MemoryRequisitionStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.check_online()?;
        if self.schema_ready.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if lock(&self.config).is_none() {
            let hash = hash_password(&self.default_admin_secret)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            *lock(&self.config) = Some(hash);
        }

        let mut records = lock(&self.records);
        if records.is_empty() {
            for requisition in seed::example_requisitions() {
                records.push(codec::encode_record(&requisition)?);
            }
        }
        Ok(())
    }

    async fn fetch_requisitions(&self) -> Result<Vec<Requisition>, StoreError> {
        self.check_online()?;
        let mut records = lock(&self.records).clone();
        // Dates are stored as ISO text, so text order is date order.
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(codec::decode_records(records))
    }

    async fn insert_requisition(&self, requisition: &Requisition) -> Result<(), StoreError> {
        self.check_writable()?;
        let record = codec::encode_record(requisition)?;
        let mut records = lock(&self.records);
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing)
                if existing.department == record.department
                    && existing.requester == record.requester
                    && existing.date == record.date =>
            {
                *existing = record;
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(record.id)),
            None => {
                records.push(record);
                Ok(())
            }
        }
    }

    async fn update_requisition(&self, requisition: &Requisition) -> Result<(), StoreError> {
        self.check_writable()?;
        let record = codec::encode_record(requisition)?;
        self.with_record(&requisition.id, |existing| *existing = record)
    }

    async fn update_status(
        &self,
        id: &str,
        status: RequestStatus,
        reason: ReasonUpdate,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_record(id, |record| {
            record.status = Some(status.to_string());
            match reason {
                ReasonUpdate::Keep => {}
                ReasonUpdate::Clear => record.rejection_reason = None,
                ReasonUpdate::Set(reason) => record.rejection_reason = Some(reason),
            }
        })
    }

    async fn verify_admin_credential(&self, secret: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(match lock(&self.config).as_deref() {
            Some(stored) => credential_matches(secret, stored),
            None => secret == self.default_admin_secret,
        })
    }
}
