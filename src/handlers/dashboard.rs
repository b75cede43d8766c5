use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};
use chrono::{Local, NaiveDate};
use tower_cookies::Cookies;

use crate::{
    app::AppState,
    errors::AppError,
    handlers::{NoticeQuery, PageContext},
    middleware::current_session,
    models::{RequestStatus, Requisition},
    registry::Snapshot,
    session::{PreferenceStore, Session, NOTIFICATION_COUNT_KEY},
    views::{self, DashboardScope, NotificationTracker, Stats},
};

pub struct DistributionBar {
    pub label: String,
    pub name: String,
    pub count: usize,
    pub percent: usize,
}

pub struct StatusCount {
    pub status: String,
    pub css: &'static str,
    pub count: usize,
}

pub struct NotificationRow {
    pub id: String,
    pub status: String,
    pub requester: String,
    pub date: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    layout: PageContext,
    month_label: String,
    stats: Stats,
    department_distribution: Vec<DistributionBar>,
    status_distribution: Vec<StatusCount>,
    notifications: Vec<NotificationRow>,
    new_notifications: usize,
}

pub fn status_css(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::ForSigning => "signing",
        RequestStatus::InProgress => "progress",
        RequestStatus::ReadyForPickup => "pickup",
        RequestStatus::Completed => "completed",
        RequestStatus::Rejected => "rejected",
        RequestStatus::ForJustification => "justification",
    }
}

fn distribution_bars(requisitions: &[Requisition], today: NaiveDate) -> Vec<DistributionBar> {
    let entries = views::derive_department_distribution(requisitions, today);
    let max = entries.first().map(|e| e.count).unwrap_or(0).max(1);
    entries
        .into_iter()
        .map(|entry| DistributionBar {
            percent: entry.count * 100 / max,
            label: entry.label,
            name: entry.name,
            count: entry.count,
        })
        .collect()
}

fn status_counts(requisitions: &[Requisition], session: &Session, scope: DashboardScope) -> Vec<StatusCount> {
    views::derive_status_distribution(requisitions, session, scope)
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: status.to_string(),
            css: status_css(status),
            count,
        })
        .collect()
}

fn notification_rows(snapshot: &Snapshot, session: &Session) -> Vec<NotificationRow> {
    views::notification_feed(&snapshot.requisitions, session)
        .into_iter()
        .map(|r| NotificationRow {
            id: r.id.clone(),
            status: r.status.to_string(),
            requester: r.requester.clone(),
            date: r.date.to_string(),
        })
        .collect()
}

/// Compares the feed size with the one stored at the previous visit and stores the new size.
pub fn track_notifications(prefs: &dyn PreferenceStore, count: usize) -> usize {
    let last = prefs
        .load(NOTIFICATION_COUNT_KEY)
        .and_then(|raw| raw.parse::<usize>().ok());
    let grew = NotificationTracker::with_last_count(last).observe(count);
    prefs.save(NOTIFICATION_COUNT_KEY, &count.to_string());
    grew.unwrap_or(0)
}

pub async fn dashboard(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Html<String>, AppError> {
    let (session, prefs) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let today = Local::now().date_naive();

    let notifications = notification_rows(&snapshot, &session);
    let new_notifications = track_notifications(&prefs, notifications.len());
    if new_notifications > 0 {
        log::info!("{} new notifications for {:?}", new_notifications, session.selected_department);
    }

    let template = DashboardTemplate {
        layout: PageContext::new(&session, &snapshot, query.notice, "dashboard"),
        month_label: today.format("%B %Y").to_string(),
        stats: views::derive_stats(&snapshot.requisitions, &session, state.scope, today),
        department_distribution: distribution_bars(&snapshot.requisitions, today),
        status_distribution: status_counts(&snapshot.requisitions, &session, state.scope),
        notifications,
        new_notifications,
    };

    Ok(Html(template.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryPreferences;

    #[test]
    fn notification_growth_is_tracked_across_visits() {
        let prefs = MemoryPreferences::default();
        assert_eq!(track_notifications(&prefs, 2), 0);
        assert_eq!(track_notifications(&prefs, 2), 0);
        assert_eq!(track_notifications(&prefs, 5), 3);
        assert_eq!(track_notifications(&prefs, 1), 0);
        assert_eq!(prefs.load(NOTIFICATION_COUNT_KEY).as_deref(), Some("1"));
    }

    #[test]
    fn department_switch_does_not_report_new_notifications() {
        let prefs = MemoryPreferences::default();
        let departments = crate::models::Department::defaults();
        let mut session = Session::default();
        session
            .select_department(&prefs, Some("Kitchen".into()), &departments)
            .expect("select");
        assert_eq!(track_notifications(&prefs, 1), 0);

        session
            .select_department(&prefs, Some("Housekeeping".into()), &departments)
            .expect("switch");
        assert_eq!(track_notifications(&prefs, 6), 0);
        assert_eq!(track_notifications(&prefs, 7), 1);
    }
}
