use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{
    Department, InventoryRecord, ItemSource, RemarkType, RequestStatus, Requisition,
    RequisitionItem,
};

pub const ADMIN_PASSWORD_KEY: &str = "admin_password";

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn item(id: &str, name: &str, quantity: u32, unit: &str, cost: i64, source: ItemSource) -> RequisitionItem {
    RequisitionItem {
        id: id.to_string(),
        name: name.to_string(),
        quantity,
        unit: unit.to_string(),
        estimated_cost: Decimal::new(cost, 0),
        source,
        bought: None,
    }
}

/// Requisitions written into an empty store on first start.
pub fn example_requisitions() -> Vec<Requisition> {
    vec![
        Requisition {
            id: "REQ-101".to_string(),
            department: Department::from("Housekeeping"),
            requester: "MARIA GARCIA".to_string(),
            date: date(2024, 5, 15),
            items: vec![item("itm-1", "BATH TOWELS", 50, "PIECES", 600, ItemSource::Warehouse)],
            status: RequestStatus::InProgress,
            remarks: RemarkType::Urgent,
            description: Some("Urgent replacement for East Wing rooms.".to_string()),
            event_date: None,
            rejection_reason: None,
        },
        Requisition {
            id: "REQ-102".to_string(),
            department: Department::from("F&B Service"),
            requester: "JAMES WILSON".to_string(),
            date: date(2024, 5, 14),
            items: vec![item("itm-2", "WINE GLASSES", 24, "PIECES", 120, ItemSource::Warehouse)],
            status: RequestStatus::ForSigning,
            remarks: RemarkType::ParStock,
            description: None,
            event_date: None,
            rejection_reason: None,
        },
        Requisition {
            id: "REQ-103".to_string(),
            department: Department::from("Sports & Recreations"),
            requester: "ALEX CHEN".to_string(),
            date: date(2024, 5, 16),
            items: vec![item("itm-3", "TENNIS BALLS", 10, "CANISTERS", 150, ItemSource::Purchase)],
            status: RequestStatus::Pending,
            remarks: RemarkType::EventStock,
            description: Some("Supplies for Summer Tournament".to_string()),
            event_date: Some(date(2024, 6, 1)),
            rejection_reason: None,
        },
    ]
}

/// Stock registry rows for `STORE_BACKEND=memory` runs.
pub fn demo_inventory() -> Vec<InventoryRecord> {
    let row = |id: &str, name: &str, category: &str, par: i64, uom: &str, cost: i64, stock: &str| InventoryRecord {
        id: id.to_string(),
        name: Some(name.to_string()),
        category: Some(category.to_string()),
        par_stock: Some(par),
        uom: Some(uom.to_string()),
        unit_cost: Some(Decimal::new(cost, 0)),
        stock_json: Some(stock.to_string()),
    };
    vec![
        row("1", "Bath Towels", "Housekeeping", 100, "Pieces", 12, r#"{"MAIN":60,"EAST":25}"#),
        row("2", "Bed Linens", "Housekeeping", 40, "Sets", 35, r#"{"MAIN":80}"#),
        row("3", "Wine Glasses", "F&B Service", 48, "Pieces", 5, r#"{"MAIN":"120"}"#),
        row("4", "Dishwashing Liquid", "Kitchen", 10, "Gallons", 18, r#"{"MAIN":6,"KITCHEN":2}"#),
        row("5", "Printer Paper", "Admin", 20, "Reams", 4, r#"{"MAIN":0}"#),
    ]
}
