use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Department;

/// Lifecycle state of a requisition.
///
/// The main path is `Pending → For signing → In Progress → Ready for Pickup → Completed`.
/// `Rejected` and `For Justification` branch off `Pending` and only ever lead back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "For signing")]
    ForSigning,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Ready for Pickup")]
    ReadyForPickup,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Rejected")]
    Rejected,
    #[serde(rename = "For Justification")]
    ForJustification,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 7] = [
        RequestStatus::Pending,
        RequestStatus::ForSigning,
        RequestStatus::InProgress,
        RequestStatus::ReadyForPickup,
        RequestStatus::Completed,
        RequestStatus::Rejected,
        RequestStatus::ForJustification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::ForSigning => "For signing",
            RequestStatus::InProgress => "In Progress",
            RequestStatus::ReadyForPickup => "Ready for Pickup",
            RequestStatus::Completed => "Completed",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::ForJustification => "For Justification",
        }
    }

    /// Successor in the transition table, `None` for the terminal state.
    pub fn next(self) -> Option<RequestStatus> {
        match self {
            RequestStatus::Pending => Some(RequestStatus::ForSigning),
            RequestStatus::ForSigning => Some(RequestStatus::InProgress),
            RequestStatus::InProgress => Some(RequestStatus::ReadyForPickup),
            RequestStatus::ReadyForPickup => Some(RequestStatus::Completed),
            RequestStatus::Completed => None,
            RequestStatus::Rejected | RequestStatus::ForJustification => {
                Some(RequestStatus::Pending)
            }
        }
    }

    /// Statuses that carry a rejection reason.
    pub fn is_returned(self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::ForJustification)
    }

    /// Statuses listed after all open requisitions.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Rejected | RequestStatus::ForJustification
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// Explicit admin choice when sending a Pending requisition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnBranch {
    Rejected,
    ForJustification,
}

impl ReturnBranch {
    pub fn status(self) -> RequestStatus {
        match self {
            ReturnBranch::Rejected => RequestStatus::Rejected,
            ReturnBranch::ForJustification => RequestStatus::ForJustification,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemarkType {
    #[serde(rename = "Urgent")]
    Urgent,
    #[serde(rename = "PAR Stock")]
    ParStock,
    #[serde(rename = "Event Stock")]
    EventStock,
}

impl RemarkType {
    pub const ALL: [RemarkType; 3] = [RemarkType::Urgent, RemarkType::ParStock, RemarkType::EventStock];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemarkType::Urgent => "Urgent",
            RemarkType::ParStock => "PAR Stock",
            RemarkType::EventStock => "Event Stock",
        }
    }
}

impl Default for RemarkType {
    fn default() -> Self {
        RemarkType::ParStock
    }
}

impl fmt::Display for RemarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemarkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RemarkType::ALL
            .into_iter()
            .find(|remark| remark.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown remark '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemSource {
    Warehouse,
    Purchase,
}

impl fmt::Display for ItemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemSource::Warehouse => f.write_str("Warehouse"),
            ItemSource::Purchase => f.write_str("Purchase"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequisitionItem {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub unit: String,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub estimated_cost: Decimal,
    pub source: ItemSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bought: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requisition {
    pub id: String,
    pub department: Department,
    pub requester: String,
    pub date: NaiveDate,
    pub items: Vec<RequisitionItem>,
    pub status: RequestStatus,
    pub remarks: RemarkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl Requisition {
    pub fn total_cost(&self) -> Decimal {
        self.items.iter().map(|item| item.estimated_cost).sum()
    }

    pub fn item(&self, item_id: &str) -> Option<&RequisitionItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Moves the requisition to `status`, keeping the reason invariant: any move to
    /// `Pending` drops the stored reason.
    pub fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
        if status == RequestStatus::Pending {
            self.rejection_reason = None;
        }
    }
}

/// One row of the `requisitions` table. Items are kept as the serialized blob.
#[derive(Debug, Clone, FromRow)]
pub struct RequisitionRecord {
    pub id: String,
    pub department: Option<String>,
    pub requester: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
    pub description: Option<String>,
    pub items: Option<String>,
    pub event_date: Option<String>,
    pub rejection_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_path_reaches_completed_in_four_steps() {
        let mut status = RequestStatus::Pending;
        let mut seen = vec![status];
        for _ in 0..4 {
            status = status.next().expect("successor");
            assert!(!seen.contains(&status));
            seen.push(status);
        }
        assert_eq!(status, RequestStatus::Completed);
        assert_eq!(status.next(), None);
    }

    #[test]
    fn returned_statuses_only_lead_back_to_pending() {
        assert_eq!(RequestStatus::Rejected.next(), Some(RequestStatus::Pending));
        assert_eq!(RequestStatus::ForJustification.next(), Some(RequestStatus::Pending));
    }

    #[test]
    fn status_parses_display_names() {
        for status in RequestStatus::ALL {
            assert_eq!(status.as_str().parse::<RequestStatus>(), Ok(status));
        }
        assert!("Shipped".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn item_json_uses_camel_case_and_numeric_cost() {
        let item = RequisitionItem {
            id: "itm-1".into(),
            name: "BATH TOWELS".into(),
            quantity: 50,
            unit: "PIECES".into(),
            estimated_cost: Decimal::new(600, 0),
            source: ItemSource::Warehouse,
            bought: None,
        };
        let json = serde_json::to_value(&item).expect("serialize");
        assert_eq!(json["estimatedCost"], serde_json::json!(600.0));
        assert_eq!(json["source"], "Warehouse");
        assert!(json.get("bought").is_none());
    }

    #[test]
    fn moving_to_pending_clears_reason() {
        let mut req = Requisition {
            id: "SGHC HOU-2024-05-0001".into(),
            department: Department::from("Housekeeping"),
            requester: "MARIA".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 2).expect("date"),
            items: vec![],
            status: RequestStatus::Rejected,
            remarks: RemarkType::Urgent,
            description: None,
            event_date: None,
            rejection_reason: Some("OUT OF BUDGET".into()),
        };
        req.set_status(RequestStatus::Pending);
        assert_eq!(req.rejection_reason, None);
    }
}
