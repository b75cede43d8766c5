//! Persistence gateway: the read-only stock registry and the read/write requisitions store.

pub mod codec;
pub mod memory;
pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    errors::StoreError,
    models::{Department, InventoryItem, RequestStatus, Requisition},
};

pub use memory::{MemoryInventoryStore, MemoryRequisitionStore};
pub use postgres::{PgInventoryStore, PgRequisitionStore};

/// What `update_status` does with the stored rejection reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonUpdate {
    /// Leave the column untouched.
    Keep,
    /// Explicitly null it out.
    Clear,
    Set(String),
}

impl ReasonUpdate {
    /// Reason update implied by moving a requisition into `status`.
    pub fn for_status(status: RequestStatus, reason: Option<&str>) -> ReasonUpdate {
        match (status, reason) {
            (RequestStatus::Pending, _) => ReasonUpdate::Clear,
            (_, Some(reason)) => ReasonUpdate::Set(reason.to_string()),
            (_, None) => ReasonUpdate::Keep,
        }
    }
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// All registry items with positive total stock.
    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, StoreError>;

    /// Departments from the registry's `system_config` document; empty when absent or malformed.
    async fn fetch_departments(&self) -> Result<Vec<Department>, StoreError>;
}

#[async_trait]
pub trait RequisitionStore: Send + Sync {
    /// Creates missing tables/columns and seeds an empty store. Safe to call repeatedly.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// All requisitions, newest first. Rows with unreadable item blobs come back with no items.
    async fn fetch_requisitions(&self) -> Result<Vec<Requisition>, StoreError>;

    async fn insert_requisition(&self, requisition: &Requisition) -> Result<(), StoreError>;

    async fn update_requisition(&self, requisition: &Requisition) -> Result<(), StoreError>;

    async fn update_status(
        &self,
        id: &str,
        status: RequestStatus,
        reason: ReasonUpdate,
    ) -> Result<(), StoreError>;

    async fn verify_admin_credential(&self, secret: &str) -> Result<bool, StoreError>;
}

#[derive(Deserialize)]
struct SystemConfig {
    #[serde(default)]
    departments: Option<Vec<String>>,
}

/// Reads the `departments` array out of a `system_config` document.
pub fn parse_departments(raw: &str) -> Vec<Department> {
    match serde_json::from_str::<SystemConfig>(raw) {
        Ok(config) => config
            .departments
            .unwrap_or_default()
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(Department::from)
            .collect(),
        Err(err) => {
            log::error!("malformed system_config document: {}", err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn departments_come_from_config_array() {
        let departments = parse_departments(r#"{"departments":["Housekeeping"," Spa ",""]}"#);
        assert_eq!(departments, vec![Department::from("Housekeeping"), Department::from("Spa")]);
    }

    #[test]
    fn malformed_or_missing_departments_yield_empty_list() {
        assert!(parse_departments("not json").is_empty());
        assert!(parse_departments(r#"{"departments":"Housekeeping"}"#).is_empty());
        assert!(parse_departments(r#"{"theme":"dark"}"#).is_empty());
    }

    #[test]
    fn pending_always_clears_reason() {
        assert_eq!(
            ReasonUpdate::for_status(RequestStatus::Pending, Some("ignored")),
            ReasonUpdate::Clear
        );
        assert_eq!(
            ReasonUpdate::for_status(RequestStatus::Rejected, Some("OUT OF BUDGET")),
            ReasonUpdate::Set("OUT OF BUDGET".into())
        );
        assert_eq!(
            ReasonUpdate::for_status(RequestStatus::ForSigning, None),
            ReasonUpdate::Keep
        );
    }
}
