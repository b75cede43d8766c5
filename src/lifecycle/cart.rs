use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    errors::LifecycleError,
    models::{InventoryItem, ItemSource, RequisitionItem},
};

pub const DEFAULT_UNIT: &str = "UNITS";

fn item_token() -> String {
    Uuid::new_v4().simple().to_string()[..9].to_string()
}

fn find_inventory<'a>(inventory: &'a [InventoryItem], name: &str) -> Option<&'a InventoryItem> {
    inventory.iter().find(|item| item.matches_name(name))
}

/// Builds a normalised item: upper-case name and unit, sourced from the warehouse when the
/// registry knows the name, priced from the registry's unit cost.
pub fn resolve_item(
    name: &str,
    quantity: u32,
    unit: &str,
    inventory: &[InventoryItem],
) -> Result<RequisitionItem, LifecycleError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LifecycleError::MissingItemName);
    }
    if quantity == 0 {
        return Err(LifecycleError::InvalidQuantity(name.to_uppercase()));
    }
    let unit = match unit.trim() {
        "" => DEFAULT_UNIT.to_string(),
        unit => unit.to_uppercase(),
    };

    let matched = find_inventory(inventory, name);
    let unit_price = matched.map(|item| item.price_per_unit).unwrap_or(Decimal::ZERO);

    Ok(RequisitionItem {
        id: item_token(),
        name: name.to_uppercase(),
        quantity,
        unit,
        estimated_cost: unit_price * Decimal::from(quantity),
        source: if matched.is_some() {
            ItemSource::Warehouse
        } else {
            ItemSource::Purchase
        },
        bought: None,
    })
}

/// Items collected before submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<RequisitionItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[RequisitionItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<RequisitionItem> {
        self.items
    }

    /// Adds an item, merging it into an existing line with the same name and unit.
    pub fn add(
        &mut self,
        name: &str,
        quantity: u32,
        unit: &str,
        inventory: &[InventoryItem],
    ) -> Result<&RequisitionItem, LifecycleError> {
        let item = resolve_item(name, quantity, unit, inventory)?;
        let duplicate = self
            .items
            .iter()
            .position(|existing| existing.name == item.name && existing.unit == item.unit);
        let index = match duplicate {
            Some(index) => {
                let existing = &mut self.items[index];
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| LifecycleError::InvalidQuantity(item.name.clone()))?;
                existing.estimated_cost += item.estimated_cost;
                index
            }
            None => {
                self.items.push(item);
                self.items.len() - 1
            }
        };
        Ok(&self.items[index])
    }

    pub fn remove(&mut self, item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != item_id);
        self.items.len() != before
    }
}

/// Advisory only: the request asks for more than the registry holds.
pub fn exceeds_stock(name: &str, quantity: u32, inventory: &[InventoryItem]) -> bool {
    find_inventory(inventory, name)
        .map(|item| i64::from(quantity) > item.stock)
        .unwrap_or(false)
}

/// Working copy of a requisition's editable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RequisitionEdit {
    pub items: Vec<RequisitionItem>,
    pub description: Option<String>,
}

impl RequisitionEdit {
    pub fn remove_item(&mut self, item_id: &str) -> Result<(), LifecycleError> {
        let before = self.items.len();
        self.items.retain(|item| item.id != item_id);
        if self.items.len() == before {
            return Err(LifecycleError::ItemNotFound(item_id.to_string()));
        }
        Ok(())
    }

    /// Sets a quantity (at least 1). The cost follows the registry price when the item
    /// is known there and is otherwise left as it was.
    pub fn set_quantity(
        &mut self,
        item_id: &str,
        quantity: u32,
        inventory: &[InventoryItem],
    ) -> Result<(), LifecycleError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| LifecycleError::ItemNotFound(item_id.to_string()))?;
        let quantity = quantity.max(1);
        item.quantity = quantity;
        if let Some(priced) = find_inventory(inventory, &item.name)
            .filter(|inv| inv.price_per_unit > Decimal::ZERO)
        {
            item.estimated_cost = priced.price_per_unit * Decimal::from(quantity);
        }
        Ok(())
    }

    pub fn add_item(
        &mut self,
        name: &str,
        quantity: u32,
        unit: &str,
        inventory: &[InventoryItem],
    ) -> Result<(), LifecycleError> {
        self.items.push(resolve_item(name, quantity, unit, inventory)?);
        Ok(())
    }
}
