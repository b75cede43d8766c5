use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    app::AppState,
    errors::AppError,
    filters,
    handlers::PageContext,
    middleware::current_session,
    models::InventoryItem,
    views,
};

pub struct StockRow {
    pub name: String,
    pub category: String,
    pub stock: i64,
    pub min_stock: i64,
    pub unit: String,
    pub price: Decimal,
    pub low: bool,
}

impl From<&InventoryItem> for StockRow {
    fn from(item: &InventoryItem) -> Self {
        StockRow {
            name: item.name.clone(),
            category: item.category.clone(),
            stock: item.stock,
            min_stock: item.min_stock,
            unit: item.unit.clone(),
            price: item.price_per_unit,
            low: item.is_low_stock(),
        }
    }
}

#[derive(Template)]
#[template(path = "inventory.html")]
struct InventoryTemplate {
    layout: PageContext,
    rows: Vec<StockRow>,
    query: String,
    categories: Vec<String>,
    low_count: usize,
}

#[derive(Deserialize)]
pub struct InventoryQuery {
    q: Option<String>,
    notice: Option<String>,
}

pub async fn inventory_list(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> Result<Html<String>, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let search = query.q.unwrap_or_default();

    let rows: Vec<StockRow> = views::search_inventory(&snapshot.inventory, &search)
        .into_iter()
        .map(StockRow::from)
        .collect();

    let template = InventoryTemplate {
        layout: PageContext::new(&session, &snapshot, query.notice, "inventory"),
        low_count: rows.iter().filter(|row| row.low).count(),
        rows,
        query: search,
        categories: views::inventory_categories(&snapshot.inventory),
    };
    Ok(Html(template.render()?))
}
