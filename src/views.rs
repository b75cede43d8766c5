//! Dashboard and list derivations. Everything here is a pure function of the
//! requisition/inventory collections and the session.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::{
    models::{Department, InventoryItem, RequestStatus, Requisition},
    session::Session,
};

const LABEL_LIMIT: usize = 12;
const LABEL_KEEP: usize = 10;

/// What the dashboard shows when no department is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DashboardScope {
    /// Stats stay at zero until a department is chosen.
    #[default]
    DepartmentOnly,
    /// Falls back to every department's activity.
    AllWhenUnset,
}

impl FromStr for DashboardScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "department-only" | "department_only" => Ok(DashboardScope::DepartmentOnly),
            "all-when-unset" | "all_when_unset" | "all" => Ok(DashboardScope::AllWhenUnset),
            other => Err(format!("unknown dashboard scope '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    /// Pending.
    pub new: usize,
    /// For signing.
    pub signing: usize,
    /// Ready for Pickup.
    pub active: usize,
    pub completed: usize,
    pub total: usize,
    /// Percentage of completed requisitions, rounded.
    pub completion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionEntry {
    pub label: String,
    pub name: String,
    pub count: usize,
}

fn in_month(requisition: &Requisition, today: NaiveDate) -> bool {
    requisition.date.year() == today.year() && requisition.date.month() == today.month()
}

/// Requisitions the session's dashboard is about, before any date restriction.
fn scoped<'a>(
    requisitions: &'a [Requisition],
    session: &'a Session,
    scope: DashboardScope,
) -> impl Iterator<Item = &'a Requisition> + 'a {
    requisitions.iter().filter(move |r| match &session.selected_department {
        Some(department) => &r.department == department,
        None => scope == DashboardScope::AllWhenUnset,
    })
}

pub fn derive_stats(
    requisitions: &[Requisition],
    session: &Session,
    scope: DashboardScope,
    today: NaiveDate,
) -> Stats {
    let mut stats = Stats::default();
    for requisition in scoped(requisitions, session, scope).filter(|r| in_month(r, today)) {
        stats.total += 1;
        match requisition.status {
            RequestStatus::Pending => stats.new += 1,
            RequestStatus::ForSigning => stats.signing += 1,
            RequestStatus::ReadyForPickup => stats.active += 1,
            RequestStatus::Completed => stats.completed += 1,
            _ => {}
        }
    }
    stats.completion_rate = completion_rate(stats.completed, stats.total);
    stats
}

fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

/// Chart label: names longer than 12 characters keep 10 and gain an ellipsis.
pub fn chart_label(name: &str) -> String {
    if name.chars().count() > LABEL_LIMIT {
        format!("{}...", name.chars().take(LABEL_KEEP).collect::<String>())
    } else {
        name.to_string()
    }
}

/// This month's requisitions per department, busiest first.
pub fn derive_department_distribution(
    requisitions: &[Requisition],
    today: NaiveDate,
) -> Vec<DistributionEntry> {
    let mut counts: BTreeMap<&Department, usize> = BTreeMap::new();
    for requisition in requisitions.iter().filter(|r| in_month(r, today)) {
        *counts.entry(&requisition.department).or_default() += 1;
    }

    let mut entries: Vec<DistributionEntry> = counts
        .into_iter()
        .map(|(department, count)| DistributionEntry {
            label: chart_label(department.as_str()),
            name: department.to_string(),
            count,
        })
        .collect();
    // Stable sort keeps departments with equal counts in name order.
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

/// Count per status over the session's requisitions, in lifecycle order, zeros omitted.
pub fn derive_status_distribution(
    requisitions: &[Requisition],
    session: &Session,
    scope: DashboardScope,
) -> Vec<(RequestStatus, usize)> {
    let mut counts: HashMap<RequestStatus, usize> = HashMap::new();
    for requisition in scoped(requisitions, session, scope) {
        *counts.entry(requisition.status).or_default() += 1;
    }
    RequestStatus::ALL
        .into_iter()
        .filter_map(|status| counts.get(&status).map(|count| (status, *count)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DepartmentFilter {
    #[default]
    All,
    Only(Department),
}

impl DepartmentFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("All") => DepartmentFilter::All,
            Some(name) => DepartmentFilter::Only(Department::from(name)),
        }
    }

    pub fn matches(&self, department: &Department) -> bool {
        match self {
            DepartmentFilter::All => true,
            DepartmentFilter::Only(only) => only == department,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub query: String,
    pub department: DepartmentFilter,
}

impl ListFilter {
    /// The list opens on the session's department, or everything when none is set.
    pub fn for_session(session: &Session) -> Self {
        ListFilter {
            query: String::new(),
            department: session
                .selected_department
                .clone()
                .map(DepartmentFilter::Only)
                .unwrap_or_default(),
        }
    }

    pub fn matches(&self, requisition: &Requisition) -> bool {
        self.department.matches(&requisition.department) && matches_query(requisition, &self.query)
    }
}

fn matches_query(requisition: &Requisition, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    requisition.requester.to_lowercase().contains(&query)
        || requisition.id.to_lowercase().contains(&query)
        || requisition
            .items
            .iter()
            .any(|item| item.name.to_lowercase().contains(&query))
}

/// Open requisitions first, closed ones (Completed, Rejected, For Justification) last,
/// each group oldest first.
pub fn sort_for_list(requisitions: &mut [&Requisition]) {
    requisitions.sort_by_key(|r| (r.status.is_closed(), r.date));
}

pub fn list_view<'a>(requisitions: &'a [Requisition], filter: &ListFilter) -> Vec<&'a Requisition> {
    let mut visible: Vec<&Requisition> = requisitions.iter().filter(|r| filter.matches(r)).collect();
    sort_for_list(&mut visible);
    visible
}

/// Requisitions waiting on the session's department: to sign or to collect.
pub fn notification_feed<'a>(requisitions: &'a [Requisition], session: &Session) -> Vec<&'a Requisition> {
    let Some(department) = &session.selected_department else {
        return Vec::new();
    };
    requisitions
        .iter()
        .filter(|r| {
            &r.department == department
                && matches!(r.status, RequestStatus::ForSigning | RequestStatus::ReadyForPickup)
        })
        .collect()
}

/// Remembers the last feed size so callers can react when it grows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationTracker {
    last_count: Option<usize>,
}

impl NotificationTracker {
    pub fn with_last_count(last_count: Option<usize>) -> Self {
        Self { last_count }
    }

    /// Records `count` and returns how much it grew since the previous observation.
    /// The first observation never counts as growth.
    pub fn observe(&mut self, count: usize) -> Option<usize> {
        let previous = self.last_count.replace(count);
        match previous {
            Some(previous) if count > previous => Some(count - previous),
            _ => None,
        }
    }
}

pub fn search_inventory<'a>(inventory: &'a [InventoryItem], query: &str) -> Vec<&'a InventoryItem> {
    let query = query.trim().to_lowercase();
    inventory
        .iter()
        .filter(|item| {
            query.is_empty()
                || item.name.to_lowercase().contains(&query)
                || item.category.to_lowercase().contains(&query)
        })
        .collect()
}

/// Distinct non-empty categories, sorted.
pub fn inventory_categories(inventory: &[InventoryItem]) -> Vec<String> {
    let mut categories: Vec<String> = inventory
        .iter()
        .map(|item| item.category.trim().to_string())
        .filter(|category| !category.is_empty())
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemSource, RemarkType, RequisitionItem};
    use rust_decimal::Decimal;

    fn day(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).expect("date")
    }

    fn req(id: &str, department: &str, status: RequestStatus, date: NaiveDate) -> Requisition {
        Requisition {
            id: id.into(),
            department: department.into(),
            requester: "MARIA GARCIA".into(),
            date,
            items: vec![RequisitionItem {
                id: format!("{}-i", id),
                name: "BATH TOWELS".into(),
                quantity: 1,
                unit: "PIECES".into(),
                estimated_cost: Decimal::ZERO,
                source: ItemSource::Warehouse,
                bought: None,
            }],
            status,
            remarks: RemarkType::Urgent,
            description: None,
            event_date: None,
            rejection_reason: None,
        }
    }

    fn sample() -> Vec<Requisition> {
        vec![
            req("H1", "Housekeeping", RequestStatus::Pending, day(5, 3)),
            req("H2", "Housekeeping", RequestStatus::ForSigning, day(5, 4)),
            req("H3", "Housekeeping", RequestStatus::Completed, day(5, 5)),
            req("H4", "Housekeeping", RequestStatus::ReadyForPickup, day(5, 6)),
            req("H0", "Housekeeping", RequestStatus::Completed, day(4, 30)),
            req("K1", "Kitchen", RequestStatus::Completed, day(5, 2)),
            req("S1", "Sports & Recreations", RequestStatus::Rejected, day(5, 1)),
        ]
    }

    #[test]
    fn stats_cover_department_in_current_month() {
        let stats = derive_stats(&sample(), &Session::staff("Housekeeping"), DashboardScope::DepartmentOnly, day(5, 20));
        assert_eq!(
            stats,
            Stats {
                new: 1,
                signing: 1,
                active: 1,
                completed: 1,
                total: 4,
                completion_rate: 25,
            }
        );
    }

    #[test]
    fn unset_department_depends_on_scope() {
        let none = Session::default();
        assert_eq!(
            derive_stats(&sample(), &none, DashboardScope::DepartmentOnly, day(5, 20)),
            Stats::default()
        );
        let all = derive_stats(&sample(), &none, DashboardScope::AllWhenUnset, day(5, 20));
        assert_eq!(all.total, 6);
        assert_eq!(all.completion_rate, 33);
    }

    #[test]
    fn empty_month_has_zero_rate() {
        let stats = derive_stats(&sample(), &Session::staff("Laundry"), DashboardScope::DepartmentOnly, day(5, 20));
        assert_eq!(stats.completion_rate, 0);
    }

    #[test]
    fn department_distribution_is_monthly_and_descending() {
        let distribution = derive_department_distribution(&sample(), day(5, 20));
        assert_eq!(distribution[0].name, "Housekeeping");
        assert_eq!(distribution[0].count, 4);
        assert_eq!(distribution.len(), 3);
        let sports = distribution.iter().find(|e| e.name == "Sports & Recreations").expect("entry");
        assert_eq!(sports.label, "Sports & R...");
    }

    #[test]
    fn chart_labels_truncate_past_twelve() {
        assert_eq!(chart_label("Front Office"), "Front Office");
        assert_eq!(chart_label("Human Resource"), "Human Reso...");
    }

    #[test]
    fn status_distribution_uses_department_filter() {
        let counts = derive_status_distribution(&sample(), &Session::staff("Housekeeping"), DashboardScope::DepartmentOnly);
        assert_eq!(
            counts,
            vec![
                (RequestStatus::Pending, 1),
                (RequestStatus::ForSigning, 1),
                (RequestStatus::ReadyForPickup, 1),
                (RequestStatus::Completed, 2),
            ]
        );
    }

    #[test]
    fn all_filter_returns_everything_and_department_filter_is_exact() {
        let data = sample();
        assert_eq!(list_view(&data, &ListFilter::default()).len(), data.len());

        let kitchen = ListFilter {
            query: String::new(),
            department: DepartmentFilter::parse(Some("Kitchen")),
        };
        let visible = list_view(&data, &kitchen);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "K1");
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let data = sample();
        let by_id = ListFilter { query: "h2".into(), ..ListFilter::default() };
        assert_eq!(list_view(&data, &by_id).len(), 1);
        let by_item = ListFilter { query: "towel".into(), ..ListFilter::default() };
        assert_eq!(list_view(&data, &by_item).len(), data.len());
        let by_requester = ListFilter { query: "maria".into(), ..ListFilter::default() };
        assert_eq!(list_view(&data, &by_requester).len(), data.len());
        let none = ListFilter { query: "champagne".into(), ..ListFilter::default() };
        assert!(list_view(&data, &none).is_empty());
    }

    #[test]
    fn closed_requisitions_sort_last_then_by_date() {
        let data = sample();
        let ids: Vec<_> = list_view(&data, &ListFilter::default()).iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["H1", "H2", "H4", "H0", "S1", "K1", "H3"]);
    }

    #[test]
    fn session_sets_default_list_filter() {
        assert_eq!(
            ListFilter::for_session(&Session::staff("Kitchen")).department,
            DepartmentFilter::Only("Kitchen".into())
        );
        assert_eq!(ListFilter::for_session(&Session::admin()).department, DepartmentFilter::All);
    }

    #[test]
    fn notifications_follow_selected_department() {
        let data = sample();
        let feed = notification_feed(&data, &Session::staff("Housekeeping"));
        let ids: Vec<_> = feed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["H2", "H4"]);
        assert!(notification_feed(&data, &Session::admin()).is_empty());

        let mut tracker = NotificationTracker::default();
        assert_eq!(tracker.observe(2), None);
        assert_eq!(tracker.observe(3), Some(1));
        assert_eq!(tracker.observe(1), None);
    }

    #[test]
    fn inventory_search_and_categories() {
        let item = |name: &str, category: &str| InventoryItem {
            id: name.into(),
            name: name.into(),
            category: category.into(),
            stock: 5,
            min_stock: 1,
            unit: "Units".into(),
            price_per_unit: Decimal::ONE,
        };
        let inventory = vec![
            item("Bath Towels", "Housekeeping"),
            item("Mini Bar Water", "F&B Service"),
            item("Bed Linens", "Housekeeping"),
        ];
        assert_eq!(search_inventory(&inventory, "HOUSE").len(), 2);
        assert_eq!(search_inventory(&inventory, "water").len(), 1);
        assert_eq!(search_inventory(&inventory, "").len(), 3);
        assert_eq!(inventory_categories(&inventory), vec!["F&B Service", "Housekeeping"]);
    }

    #[test]
    fn dashboard_scope_parses_config_values() {
        assert_eq!("all-when-unset".parse::<DashboardScope>(), Ok(DashboardScope::AllWhenUnset));
        assert_eq!("department-only".parse::<DashboardScope>(), Ok(DashboardScope::DepartmentOnly));
        assert!("sometimes".parse::<DashboardScope>().is_err());
    }
}
