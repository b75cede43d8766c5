//! JSON views for polling clients, and the manual sync trigger.

use axum::{
    extract::{Query, State},
    response::{Json, Redirect},
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    app::AppState,
    handlers::{redirect_with_notice, requisitions::ListQuery},
    middleware::current_session,
    models::{InventoryItem, RequestStatus, Requisition},
    registry::SyncOutcome,
    views::{self, DistributionEntry, Stats},
};

#[derive(Serialize)]
pub struct StatsResponse {
    pub stats: Stats,
    pub department_distribution: Vec<DistributionEntry>,
    pub status_distribution: Vec<StatusEntry>,
    pub notifications: usize,
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct StatusEntry {
    pub status: RequestStatus,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct InventoryQuery {
    q: Option<String>,
}

pub async fn requisitions(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Requisition>> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let filter = query.filter(&session);
    Json(
        views::list_view(&snapshot.requisitions, &filter)
            .into_iter()
            .cloned()
            .collect(),
    )
}

pub async fn stats(cookies: Cookies, State(state): State<AppState>) -> Json<StatsResponse> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let today = Local::now().date_naive();

    Json(StatsResponse {
        stats: views::derive_stats(&snapshot.requisitions, &session, state.scope, today),
        department_distribution: views::derive_department_distribution(&snapshot.requisitions, today),
        status_distribution: views::derive_status_distribution(&snapshot.requisitions, &session, state.scope)
            .into_iter()
            .map(|(status, count)| StatusEntry { status, count })
            .collect(),
        notifications: views::notification_feed(&snapshot.requisitions, &session).len(),
        synced_at: snapshot.synced_at,
    })
}

pub async fn inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> Json<Vec<InventoryItem>> {
    let snapshot = state.registry.snapshot().await;
    let search = query.q.unwrap_or_default();
    Json(
        views::search_inventory(&snapshot.inventory, &search)
            .into_iter()
            .cloned()
            .collect(),
    )
}

pub async fn sync(State(state): State<AppState>) -> Redirect {
    let notice = match state.registry.sync().await {
        Ok(SyncOutcome::Synced { requisitions }) => format!("Synced {} requisitions.", requisitions),
        Ok(SyncOutcome::AlreadyRunning) => "A sync is already running.".to_string(),
        Err(err) => format!("Sync failed: {}", err),
    };
    redirect_with_notice("/dashboard", &notice)
}
