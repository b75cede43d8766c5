use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Stock registry item as seen by requisitions. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub stock: i64,
    pub min_stock: i64,
    pub unit: String,
    pub price_per_unit: Decimal,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.trim().to_lowercase()
    }
}

/// Raw `inventory` row of the stock registry.
#[derive(Debug, Clone, Default, FromRow)]
pub struct InventoryRecord {
    pub id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub par_stock: Option<i64>,
    pub uom: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub stock_json: Option<String>,
}

impl InventoryRecord {
    /// Sums the per-location stock map, saturating at `i64::MAX`. Negative locations and
    /// unreadable maps count as zero stock.
    pub fn total_stock(&self) -> i64 {
        let Some(raw) = self.stock_json.as_deref() else {
            return 0;
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(locations)) => locations
                .values()
                .map(|value| location_quantity(value).max(0))
                .fold(0i64, i64::saturating_add),
            Ok(_) => 0,
            Err(err) => {
                log::warn!("could not parse stock_json for item {}: {}", self.id, err);
                0
            }
        }
    }

    pub fn into_item(self) -> InventoryItem {
        let stock = self.total_stock();
        InventoryItem {
            stock,
            name: self.name.unwrap_or_default(),
            category: self
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "General".to_string()),
            min_stock: self.par_stock.unwrap_or(0),
            unit: self
                .uom
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| "Units".to_string()),
            price_per_unit: self.unit_cost.unwrap_or_default().max(Decimal::ZERO),
            id: self.id,
        }
    }
}

fn location_quantity(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    }
}

/// Converts registry rows into items, dropping anything without stock on hand.
pub fn in_stock(records: Vec<InventoryRecord>) -> Vec<InventoryItem> {
    records
        .into_iter()
        .map(InventoryRecord::into_item)
        .filter(|item| item.stock > 0)
        .collect()
}
