use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use sghc_requisitions::{
    lifecycle::{self, Cart, RequisitionEdit, SubmissionDraft},
    models::{Department, InventoryRecord, ItemSource, RemarkType, RequestStatus, RequisitionRecord, ReturnBranch},
    registry::{Command, Registry},
    session::{MemoryPreferences, Session},
    store::{InventoryStore, MemoryInventoryStore, MemoryRequisitionStore, RequisitionStore},
    utils::AdminTokens,
    views::{self, DashboardScope, ListFilter},
    LifecycleError,
};

fn may_2024(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).expect("date")
}

fn stock(id: &str, name: &str, stock_json: &str) -> InventoryRecord {
    InventoryRecord {
        id: id.to_string(),
        name: Some(name.to_string()),
        category: Some("Housekeeping".to_string()),
        par_stock: Some(10),
        uom: Some("Pieces".to_string()),
        unit_cost: None,
        stock_json: Some(stock_json.to_string()),
    }
}

/// A store holding one unrelated April row, so seeding is skipped and May starts empty.
fn requisitions_store() -> Arc<MemoryRequisitionStore> {
    let store = Arc::new(MemoryRequisitionStore::new("luxe123"));
    store.insert_record(RequisitionRecord {
        id: "SGHC FIN-2024-04-0001".to_string(),
        department: Some("Finance".to_string()),
        requester: Some("ANA".to_string()),
        date: Some("2024-04-30".to_string()),
        status: Some("Completed".to_string()),
        remarks: Some("PAR Stock".to_string()),
        description: None,
        items: Some(r#"[{"id":"x","name":"PENS","quantity":5,"unit":"BOXES","estimatedCost":0,"source":"Purchase"}]"#.to_string()),
        event_date: None,
        rejection_reason: None,
    });
    store
}

async fn registry(store: Arc<MemoryRequisitionStore>) -> Registry {
    let inventory = Arc::new(MemoryInventoryStore::new(vec![
        stock("1", "Bath Towels", r#"{"A":30}"#),
        stock("2", "Bed Linens", r#"{"A":12,"B":8}"#),
    ]));
    let registry = Registry::new(inventory, store);
    registry.initialize().await.expect("initialize");
    registry
}

async fn housekeeping_cart(registry: &Registry) -> Cart {
    let inventory = registry.snapshot().await.inventory;
    let mut cart = Cart::new();
    cart.add("Bath Towels", 10, "pieces", &inventory).expect("add");
    cart.add("Bed Linens", 4, "sets", &inventory).expect("add");
    cart.add("Tennis Balls", 12, "cans", &inventory).expect("add");
    cart
}

#[tokio::test]
async fn mixed_cart_creates_one_requisition_per_source() {
    let store = requisitions_store();
    let registry = registry(store.clone()).await;
    let cart = housekeeping_cart(&registry).await;

    let draft = SubmissionDraft {
        requester: "Maria Garcia".to_string(),
        department: Some(Department::from("Housekeeping")),
        remarks: RemarkType::Urgent,
        items: cart.into_items(),
        ..SubmissionDraft::default()
    };
    let applied = registry.submit(draft, may_2024(20)).await.expect("submit");
    assert!(applied.persisted());

    let created = applied.value;
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].id, "SGHC HOU-2024-05-0001");
    assert_eq!(created[0].items.len(), 2);
    assert_eq!(created[1].id, "SGHC HOU-2024-05-0002");
    assert_eq!(created[1].items.len(), 1);
    assert_eq!(created[1].items[0].source, ItemSource::Purchase);

    let persisted = store.fetch_requisitions().await.expect("fetch");
    for id in ["SGHC HOU-2024-05-0001", "SGHC HOU-2024-05-0002"] {
        let requisition = persisted.iter().find(|r| r.id == id).expect("persisted");
        assert_eq!(requisition.status, RequestStatus::Pending);
        assert_eq!(requisition.requester, "MARIA GARCIA");
    }
}

#[tokio::test]
async fn rejected_requisition_returns_to_pending_after_edit() {
    let store = requisitions_store();
    let registry = registry(store.clone()).await;
    let draft = SubmissionDraft {
        requester: "Maria Garcia".to_string(),
        department: Some(Department::from("Housekeeping")),
        items: housekeeping_cart(&registry).await.into_items(),
        ..SubmissionDraft::default()
    };
    let id = registry.submit(draft, may_2024(20)).await.expect("submit").value[0].id.clone();
    let admin = Session::admin();

    registry
        .return_with_reason(&admin, &id, ReturnBranch::Rejected, "OUT OF BUDGET")
        .await
        .expect("reject");
    let stored = store.fetch_requisitions().await.expect("fetch");
    let rejected = stored.iter().find(|r| r.id == id).expect("row");
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("OUT OF BUDGET"));

    let mut edit = RequisitionEdit::from_requisition(rejected);
    let first = edit.items[0].id.clone();
    edit.set_quantity(&first, 6, &registry.snapshot().await.inventory).expect("qty");
    registry.save_edits(&admin, &id, edit).await.expect("save");

    let stored = store.fetch_requisitions().await.expect("fetch");
    let resubmitted = stored.iter().find(|r| r.id == id).expect("row");
    assert_eq!(resubmitted.status, RequestStatus::Pending);
    assert_eq!(resubmitted.rejection_reason, None);
    assert_eq!(resubmitted.items[0].quantity, 6);
}

#[tokio::test]
async fn other_department_cannot_edit_pending_requisition() {
    let registry = registry(requisitions_store()).await;
    let draft = SubmissionDraft {
        requester: "Maria Garcia".to_string(),
        department: Some(Department::from("Housekeeping")),
        items: housekeeping_cart(&registry).await.into_items(),
        ..SubmissionDraft::default()
    };
    let created = registry.submit(draft, may_2024(20)).await.expect("submit").value;
    let kitchen = Session::staff("Kitchen");

    assert_eq!(lifecycle::edit_mode(&kitchen, &created[0]), None);
    let err = registry
        .save_edits(&kitchen, &created[0].id, RequisitionEdit::from_requisition(&created[0]))
        .await
        .unwrap_err();
    assert_matches!(err, LifecycleError::NotEditable(_));
}

#[tokio::test]
async fn stock_is_summed_across_locations_and_empty_items_hidden() {
    let inventory = MemoryInventoryStore::new(vec![
        stock("1", "Bath Towels", r#"{"A":3,"B":0}"#),
        stock("2", "Pool Chlorine", r#"{"A":0,"B":0}"#),
    ]);
    let items = inventory.fetch_inventory().await.expect("inventory");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Bath Towels");
    assert_eq!(items[0].stock, 3);
}

#[tokio::test]
async fn oversized_stock_blob_does_not_break_the_refresh() {
    let inventory = Arc::new(MemoryInventoryStore::new(vec![stock(
        "9",
        "Pool Chlorine",
        r#"{"A":9223372036854775807,"B":1}"#,
    )]));
    let registry = Registry::new(inventory, requisitions_store());
    registry.initialize().await.expect("initialize");

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.inventory.len(), 1);
    assert_eq!(snapshot.inventory[0].stock, i64::MAX);
}

#[tokio::test]
async fn refused_write_is_reconciled_from_the_store() {
    let store = requisitions_store();
    let registry = registry(store.clone()).await;
    let mut events = registry.subscribe();
    let draft = SubmissionDraft {
        requester: "Maria Garcia".to_string(),
        department: Some(Department::from("Housekeeping")),
        items: housekeeping_cart(&registry).await.into_items(),
        ..SubmissionDraft::default()
    };

    store.set_reject_writes(true);
    let applied = registry.submit(draft, may_2024(20)).await.expect("submit");
    let event = applied.reconciliation.expect("reconciliation event");
    assert_eq!(event.command, Command::Submit);
    assert_eq!(event.requisition_ids.len(), 2);
    assert!(event.resynced);
    assert_eq!(events.recv().await.expect("broadcast"), event);

    let snapshot = registry.snapshot().await;
    assert!(snapshot.requisition("SGHC HOU-2024-05-0001").is_none());
    assert_eq!(snapshot.requisitions.len(), 1);
}

#[tokio::test]
async fn dashboard_and_list_follow_the_session() {
    let registry = registry(requisitions_store()).await;
    let draft = SubmissionDraft {
        requester: "Maria Garcia".to_string(),
        department: Some(Department::from("Housekeeping")),
        items: housekeeping_cart(&registry).await.into_items(),
        ..SubmissionDraft::default()
    };
    registry.submit(draft, may_2024(20)).await.expect("submit");
    let admin = Session::admin();
    registry.advance(&admin, "SGHC HOU-2024-05-0001").await.expect("advance");

    let snapshot = registry.snapshot().await;
    let housekeeping = Session::staff("Housekeeping");
    let stats = views::derive_stats(&snapshot.requisitions, &housekeeping, DashboardScope::DepartmentOnly, may_2024(25));
    assert_eq!((stats.new, stats.signing, stats.active), (1, 1, 0));
    assert_eq!(stats.completion_rate, 0);

    let feed = views::notification_feed(&snapshot.requisitions, &housekeeping);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].status, RequestStatus::ForSigning);

    let visible = views::list_view(&snapshot.requisitions, &ListFilter::for_session(&housekeeping));
    assert_eq!(visible.len(), 2);
    let everything = views::list_view(&snapshot.requisitions, &ListFilter::for_session(&admin));
    assert_eq!(everything.len(), 3);
    // Closed requisitions go last.
    assert_eq!(everything[2].status, RequestStatus::Completed);
}

#[tokio::test]
async fn admin_mode_is_granted_against_the_requisitions_store() {
    let registry = registry(requisitions_store()).await;
    let prefs = MemoryPreferences::default();
    let tokens = AdminTokens::new("integration-secret");
    let mut session = Session::default();

    assert_matches!(
        session
            .grant_admin(&prefs, registry.requisition_store(), &tokens, "wrong")
            .await,
        Err(LifecycleError::InvalidCredential)
    );
    session
        .grant_admin(&prefs, registry.requisition_store(), &tokens, "luxe123")
        .await
        .expect("grant");
    assert!(Session::load(&prefs, &tokens).is_admin);
}
