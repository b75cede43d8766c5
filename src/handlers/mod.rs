pub mod api;
pub mod dashboard;
pub mod inventory;
pub mod requisitions;
pub mod settings;

use axum::response::Redirect;
use chrono::Local;
use serde::Deserialize;

use crate::{
    registry::{ReconciliationEvent, Snapshot},
    session::Session,
};

/// One-shot message carried across a redirect in the `notice` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

pub fn redirect_with_notice(path: &str, notice: &str) -> Redirect {
    Redirect::to(&format!("{}?notice={}", path, urlencoding::encode(notice)))
}

/// Notice for a command whose write may have been refused by the store.
pub fn command_notice(done: String, reconciliation: Option<&ReconciliationEvent>) -> String {
    match reconciliation {
        None => done,
        Some(event) if event.resynced => format!(
            "Could not save changes ({}). The list was reloaded from the server.",
            event.error
        ),
        Some(event) => format!(
            "Could not save changes ({}). Shown data may be out of date until the next sync.",
            event.error
        ),
    }
}

/// Fields every page's base layout reads.
pub struct PageContext {
    pub department: String,
    pub is_admin: bool,
    pub notice: Option<String>,
    pub active: &'static str,
    pub synced_at: String,
}

impl PageContext {
    pub fn new(session: &Session, snapshot: &Snapshot, notice: Option<String>, active: &'static str) -> Self {
        PageContext {
            department: session
                .selected_department
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            is_admin: session.is_admin,
            notice: notice.filter(|n| !n.trim().is_empty()),
            active,
            synced_at: snapshot
                .synced_at
                .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "never".to_string()),
        }
    }
}
