//! In-process cache of both stores and the write path for every lifecycle command.
//!
//! Commands are optimistic: the change is applied to the cached snapshot first and then
//! written through. When the write fails the registry publishes a [`ReconciliationEvent`]
//! and refreshes the snapshot from the stores, so the cache never silently diverges.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};

use crate::{
    errors::{LifecycleError, StoreError},
    lifecycle::{self, RequisitionEdit, StatusChange, SubmissionDraft},
    models::{Department, InventoryItem, Requisition, ReturnBranch},
    session::Session,
    store::{InventoryStore, ReasonUpdate, RequisitionStore},
};

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub inventory: Vec<InventoryItem>,
    /// Newest first, as the store returns them.
    pub requisitions: Vec<Requisition>,
    pub departments: Vec<Department>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn requisition(&self, id: &str) -> Option<&Requisition> {
        self.requisitions.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    Submit,
    Advance,
    Return,
    SaveEdits,
    SetBought,
}

/// Published when a write the snapshot already reflects was refused by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationEvent {
    pub command: Command,
    pub requisition_ids: Vec<String>,
    pub error: String,
    /// Whether the snapshot was reloaded from the store afterwards.
    pub resynced: bool,
}

/// Result of a command: the locally applied value plus the reconciliation, if the write failed.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub value: T,
    pub reconciliation: Option<ReconciliationEvent>,
}

impl<T> Applied<T> {
    pub fn persisted(&self) -> bool {
        self.reconciliation.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { requisitions: usize },
    AlreadyRunning,
}

pub struct Registry {
    inventory_store: Arc<dyn InventoryStore>,
    requisition_store: Arc<dyn RequisitionStore>,
    snapshot: RwLock<Snapshot>,
    syncing: AtomicBool,
    schema_ready: AtomicBool,
    events: broadcast::Sender<ReconciliationEvent>,
}

/// Clears the in-flight flag however the sync ends.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Registry {
    pub fn new(
        inventory_store: Arc<dyn InventoryStore>,
        requisition_store: Arc<dyn RequisitionStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inventory_store,
            requisition_store,
            snapshot: RwLock::new(Snapshot {
                departments: Department::defaults(),
                ..Snapshot::default()
            }),
            syncing: AtomicBool::new(false),
            schema_ready: AtomicBool::new(false),
            events,
        }
    }

    pub fn requisition_store(&self) -> &dyn RequisitionStore {
        self.requisition_store.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconciliationEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Prepares the requisitions schema and loads the first snapshot.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.prepare_schema().await?;
        self.refresh().await.map(|_| ())
    }

    /// Creates tables and seeds once per process. Retried by every sync until it succeeds.
    async fn prepare_schema(&self) -> Result<(), StoreError> {
        if self.schema_ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = self.requisition_store.ensure_schema().await {
            log::error!("failed to prepare requisitions schema: {}", err);
            return Err(err);
        }
        self.schema_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Reloads everything. On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, StoreError> {
        let fetched = tokio::try_join!(
            self.inventory_store.fetch_inventory(),
            self.inventory_store.fetch_departments(),
            self.requisition_store.fetch_requisitions(),
        );
        let (inventory, departments, requisitions) = match fetched {
            Ok(fetched) => fetched,
            Err(err) => {
                log::error!("refresh failed, keeping previous snapshot: {}", err);
                return Err(err);
            }
        };

        let count = requisitions.len();
        let mut snapshot = self.snapshot.write().await;
        *snapshot = Snapshot {
            inventory,
            requisitions,
            departments: if departments.is_empty() {
                Department::defaults()
            } else {
                departments
            },
            synced_at: Some(Utc::now()),
        };
        log::debug!("snapshot refreshed: {} requisitions, {} inventory items", count, snapshot.inventory.len());
        Ok(count)
    }

    /// Manual sync; a second request while one is running is a no-op. A schema that
    /// failed to prepare at start-up is prepared here first.
    pub async fn sync(&self) -> Result<SyncOutcome, StoreError> {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _guard = SyncGuard(&self.syncing);
        self.prepare_schema().await?;
        let requisitions = self.refresh().await?;
        Ok(SyncOutcome::Synced { requisitions })
    }

    pub fn spawn_refresh_loop(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick fires immediately and the snapshot is already fresh.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.sync().await {
                    Ok(SyncOutcome::AlreadyRunning) => log::debug!("periodic refresh skipped, sync in flight"),
                    Ok(SyncOutcome::Synced { .. }) => {}
                    Err(err) => log::warn!("periodic refresh failed: {}", err),
                }
            }
        })
    }

    async fn reconcile(&self, command: Command, requisition_ids: Vec<String>, err: StoreError) -> ReconciliationEvent {
        log::error!("{:?} for {:?} was not persisted: {}", command, requisition_ids, err);
        let resynced = self.refresh().await.is_ok();
        let event = ReconciliationEvent {
            command,
            requisition_ids,
            error: err.to_string(),
            resynced,
        };
        if self.events.send(event.clone()).is_err() {
            log::debug!("no reconciliation listeners");
        }
        event
    }

    /// Validates a draft, appends the resulting requisitions to the snapshot and inserts them.
    pub async fn submit(
        &self,
        draft: SubmissionDraft,
        today: NaiveDate,
    ) -> Result<Applied<Vec<Requisition>>, LifecycleError> {
        let created = {
            let mut snapshot = self.snapshot.write().await;
            let created = lifecycle::build_requisitions(
                draft,
                &snapshot.departments,
                &snapshot.requisitions,
                today,
            )?;
            for requisition in created.iter().rev() {
                snapshot.requisitions.insert(0, requisition.clone());
            }
            created
        };

        for requisition in &created {
            if let Err(err) = self.requisition_store.insert_requisition(requisition).await {
                let ids = created.iter().map(|r| r.id.clone()).collect();
                let event = self.reconcile(Command::Submit, ids, err).await;
                return Ok(Applied {
                    value: created,
                    reconciliation: Some(event),
                });
            }
            log::info!("requisition {} submitted for {}", requisition.id, requisition.department);
        }

        Ok(Applied {
            value: created,
            reconciliation: None,
        })
    }

    /// Runs `apply` against the cached requisition and returns its result with a copy of
    /// the updated requisition.
    async fn apply_local<T, F>(&self, id: &str, apply: F) -> Result<(T, Requisition), LifecycleError>
    where
        F: FnOnce(&mut Requisition) -> Result<T, LifecycleError>,
    {
        let mut snapshot = self.snapshot.write().await;
        let requisition = snapshot
            .requisitions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;
        let mut working = requisition.clone();
        let value = apply(&mut working)?;
        *requisition = working.clone();
        Ok((value, working))
    }

    async fn write_status(
        &self,
        command: Command,
        change: StatusChange,
        requisition: &Requisition,
        reason: ReasonUpdate,
    ) -> Applied<StatusChange> {
        match self
            .requisition_store
            .update_status(&requisition.id, change.to, reason)
            .await
        {
            Ok(()) => {
                log::info!("requisition {}: {} -> {}", requisition.id, change.from, change.to);
                Applied {
                    value: change,
                    reconciliation: None,
                }
            }
            Err(err) => Applied {
                value: change,
                reconciliation: Some(self.reconcile(command, vec![requisition.id.clone()], err).await),
            },
        }
    }

    async fn write_requisition(&self, command: Command, requisition: Requisition) -> Applied<Requisition> {
        match self.requisition_store.update_requisition(&requisition).await {
            Ok(()) => Applied {
                value: requisition,
                reconciliation: None,
            },
            Err(err) => {
                let event = self.reconcile(command, vec![requisition.id.clone()], err).await;
                Applied {
                    value: requisition,
                    reconciliation: Some(event),
                }
            }
        }
    }

    pub async fn advance(&self, session: &Session, id: &str) -> Result<Applied<StatusChange>, LifecycleError> {
        let (change, updated) = self.apply_local(id, |r| lifecycle::advance(session, r)).await?;
        let reason = ReasonUpdate::for_status(change.to, None);
        Ok(self.write_status(Command::Advance, change, &updated, reason).await)
    }

    pub async fn return_with_reason(
        &self,
        session: &Session,
        id: &str,
        branch: ReturnBranch,
        reason: &str,
    ) -> Result<Applied<StatusChange>, LifecycleError> {
        let (change, updated) = self
            .apply_local(id, |r| lifecycle::return_with_reason(session, r, branch, reason))
            .await?;
        let reason = ReasonUpdate::for_status(change.to, updated.rejection_reason.as_deref());
        Ok(self.write_status(Command::Return, change, &updated, reason).await)
    }

    pub async fn save_edits(
        &self,
        session: &Session,
        id: &str,
        edit: RequisitionEdit,
    ) -> Result<Applied<Requisition>, LifecycleError> {
        let (_, updated) = self
            .apply_local(id, |r| {
                *r = lifecycle::save_edits(session, r, edit)?;
                Ok(())
            })
            .await?;
        Ok(self.write_requisition(Command::SaveEdits, updated).await)
    }

    pub async fn set_bought(
        &self,
        session: &Session,
        id: &str,
        item_id: &str,
        bought: bool,
    ) -> Result<Applied<Requisition>, LifecycleError> {
        let (_, updated) = self
            .apply_local(id, |r| lifecycle::set_bought(session, r, item_id, bought))
            .await?;
        Ok(self.write_requisition(Command::SetBought, updated).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lifecycle::Cart,
        models::{InventoryRecord, RemarkType, RequestStatus},
        store::{MemoryInventoryStore, MemoryRequisitionStore},
    };
    use assert_matches::assert_matches;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).expect("date")
    }

    fn inventory_store() -> Arc<MemoryInventoryStore> {
        Arc::new(MemoryInventoryStore::new(vec![InventoryRecord {
            id: "1".into(),
            name: Some("Bath Towels".into()),
            category: Some("Housekeeping".into()),
            stock_json: Some(r#"{"MAIN":40}"#.into()),
            ..InventoryRecord::default()
        }]))
    }

    async fn registry(store: Arc<MemoryRequisitionStore>) -> Registry {
        let registry = Registry::new(inventory_store(), store);
        registry.initialize().await.expect("initialize");
        registry
    }

    async fn draft(registry: &Registry) -> SubmissionDraft {
        let snapshot = registry.snapshot().await;
        let mut cart = Cart::new();
        cart.add("Bath Towels", 2, "pieces", &snapshot.inventory).expect("add");
        SubmissionDraft {
            requester: "Maria".into(),
            department: Some("Housekeeping".into()),
            remarks: RemarkType::Urgent,
            items: cart.into_items(),
            ..SubmissionDraft::default()
        }
    }

    #[tokio::test]
    async fn initialize_seeds_and_falls_back_to_default_departments() {
        let registry = registry(Arc::new(MemoryRequisitionStore::new("luxe123"))).await;
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.requisitions.len(), 3);
        assert_eq!(snapshot.inventory.len(), 1);
        assert_eq!(snapshot.departments, Department::defaults());
        assert!(snapshot.synced_at.is_some());
    }

    #[tokio::test]
    async fn sync_prepares_a_schema_that_failed_at_start_up() {
        let store = Arc::new(MemoryRequisitionStore::new("luxe123"));
        let registry = Registry::new(Arc::new(MemoryInventoryStore::new(Vec::new())), store.clone());

        store.set_offline(true);
        assert_matches!(registry.initialize().await, Err(StoreError::Unavailable(_)));
        assert!(registry.snapshot().await.requisitions.is_empty());

        store.set_offline(false);
        assert_matches!(registry.sync().await, Ok(SyncOutcome::Synced { requisitions: 3 }));
        assert_eq!(store.records().len(), 3);
        assert!(registry.snapshot().await.requisition("REQ-101").is_some());
    }

    #[tokio::test]
    async fn submit_persists_and_caches() {
        let store = Arc::new(MemoryRequisitionStore::new("luxe123"));
        let registry = registry(store.clone()).await;

        let applied = registry.submit(draft(&registry).await, today()).await.expect("submit");
        assert!(applied.persisted());
        assert_eq!(applied.value[0].id, "SGHC HOU-2024-05-0001");
        assert_eq!(store.records().len(), 4);
        assert_eq!(registry.snapshot().await.requisitions[0].id, "SGHC HOU-2024-05-0001");

        let second = registry.submit(draft(&registry).await, today()).await.expect("submit");
        assert_eq!(second.value[0].id, "SGHC HOU-2024-05-0002");
    }

    #[tokio::test]
    async fn failed_write_publishes_event_and_resyncs() {
        let store = Arc::new(MemoryRequisitionStore::new("luxe123"));
        let registry = registry(store.clone()).await;
        let mut events = registry.subscribe();
        store.set_reject_writes(true);

        let applied = registry.advance(&Session::admin(), "REQ-103").await.expect("advance");
        assert_eq!(applied.value.to, RequestStatus::ForSigning);
        let event = applied.reconciliation.expect("reconciliation");
        assert_eq!(event.command, Command::Advance);
        assert!(event.resynced);
        assert_eq!(events.recv().await.expect("event"), event);

        // The resync restored the store's view.
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.requisition("REQ-103").expect("req").status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn lifecycle_errors_leave_snapshot_untouched() {
        let registry = registry(Arc::new(MemoryRequisitionStore::new("luxe123"))).await;
        assert_matches!(
            registry.advance(&Session::staff("Sports & Recreations"), "REQ-103").await,
            Err(LifecycleError::Forbidden(_))
        );
        assert_matches!(
            registry.advance(&Session::admin(), "REQ-999").await,
            Err(LifecycleError::NotFound(_))
        );
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.requisition("REQ-103").expect("req").status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let store = Arc::new(MemoryRequisitionStore::new("luxe123"));
        let registry = registry(store.clone()).await;
        store.set_offline(true);
        assert!(registry.sync().await.is_err());
        assert_eq!(registry.snapshot().await.requisitions.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_sync_is_skipped() {
        let registry = registry(Arc::new(MemoryRequisitionStore::new("luxe123"))).await;
        registry.syncing.store(true, Ordering::SeqCst);
        assert_eq!(registry.sync().await.expect("sync"), SyncOutcome::AlreadyRunning);
        registry.syncing.store(false, Ordering::SeqCst);
        assert_eq!(registry.sync().await.expect("sync"), SyncOutcome::Synced { requisitions: 3 });
    }

    #[tokio::test]
    async fn return_and_edit_round_trip_through_store() {
        let store = Arc::new(MemoryRequisitionStore::new("luxe123"));
        let registry = registry(store.clone()).await;
        let admin = Session::admin();

        registry
            .return_with_reason(&admin, "REQ-103", ReturnBranch::Rejected, "OUT OF BUDGET")
            .await
            .expect("reject");
        registry.refresh().await.expect("refresh");
        let rejected = registry.snapshot().await.requisition("REQ-103").cloned().expect("req");
        assert_eq!(rejected.rejection_reason.as_deref(), Some("OUT OF BUDGET"));

        let saved = registry
            .save_edits(&admin, "REQ-103", RequisitionEdit::from_requisition(&rejected))
            .await
            .expect("save");
        assert!(saved.persisted());
        registry.refresh().await.expect("refresh");
        let pending = registry.snapshot().await.requisition("REQ-103").cloned().expect("req");
        assert_eq!(pending.status, RequestStatus::Pending);
        assert_eq!(pending.rejection_reason, None);
    }
}
