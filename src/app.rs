use std::sync::Arc;

use axum::{
    response::Redirect,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{handlers, registry::Registry, utils::AdminTokens, views::DashboardScope};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub tokens: AdminTokens,
    pub scope: DashboardScope,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::permanent("/dashboard") }))
        .route("/dashboard", get(handlers::dashboard::dashboard))
        // Requisitions
        .route(
            "/requisitions",
            get(handlers::requisitions::requisitions_list).post(handlers::requisitions::create_requisition),
        )
        .route("/requisitions/new", get(handlers::requisitions::requisition_form))
        .route("/requisitions/:id/advance", post(handlers::requisitions::advance_requisition))
        .route("/requisitions/:id/reject", post(handlers::requisitions::reject_requisition))
        .route(
            "/requisitions/:id/edit",
            get(handlers::requisitions::edit_form).post(handlers::requisitions::save_edits),
        )
        .route(
            "/requisitions/:id/items/:item_id/bought",
            post(handlers::requisitions::mark_bought),
        )
        // Stock registry
        .route("/inventory", get(handlers::inventory::inventory_list))
        // Settings
        .route("/settings", get(handlers::settings::settings_page))
        .route("/settings/department", post(handlers::settings::select_department))
        .route("/settings/admin", post(handlers::settings::grant_admin))
        .route("/settings/admin/revoke", post(handlers::settings::revoke_admin))
        // Sync & JSON views
        .route("/sync", post(handlers::api::sync))
        .route("/api/requisitions", get(handlers::api::requisitions))
        .route("/api/stats", get(handlers::api::stats))
        .route("/api/inventory", get(handlers::api::inventory))
        .nest_service("/static", ServeDir::new("static"))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
