use std::collections::HashMap;

use askama::Template;
use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    app::AppState,
    errors::{AppError, LifecycleError},
    filters,
    handlers::{command_notice, dashboard::status_css, redirect_with_notice, PageContext},
    lifecycle::{self, exceeds_stock, Cart, EditMode, RequisitionEdit, SubmissionDraft},
    middleware::current_session,
    models::{InventoryItem, ItemSource, RemarkType, Requisition, ReturnBranch},
    session::Session,
    views::{self, DepartmentFilter, ListFilter},
};

pub struct ItemRow {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub unit: String,
    pub cost: Decimal,
    pub source: String,
    pub is_purchase: bool,
    pub bought: bool,
}

impl ItemRow {
    fn from_item(item: &crate::models::RequisitionItem) -> Self {
        ItemRow {
            id: item.id.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            cost: item.estimated_cost,
            source: item.source.to_string(),
            is_purchase: item.source == ItemSource::Purchase,
            bought: item.bought.unwrap_or(false),
        }
    }
}

/// A requisition as the list shows it, with the actions this session may take on it.
pub struct RequisitionRow {
    pub id: String,
    pub department: String,
    pub requester: String,
    pub date: String,
    pub status: String,
    pub status_class: &'static str,
    pub remarks: String,
    pub description: String,
    pub event_date: String,
    pub rejection_reason: String,
    pub items: Vec<ItemRow>,
    pub total_cost: Decimal,
    pub can_edit: bool,
    pub can_advance: bool,
    pub next_status: String,
    pub can_return: bool,
    pub can_mark_bought: bool,
}

impl RequisitionRow {
    pub fn new(requisition: &Requisition, session: &Session) -> Self {
        RequisitionRow {
            id: requisition.id.clone(),
            department: requisition.department.to_string(),
            requester: requisition.requester.clone(),
            date: requisition.date.to_string(),
            status: requisition.status.to_string(),
            status_class: status_css(requisition.status),
            remarks: requisition.remarks.to_string(),
            description: requisition.description.clone().unwrap_or_default(),
            event_date: requisition.event_date.map(|d| d.to_string()).unwrap_or_default(),
            rejection_reason: requisition.rejection_reason.clone().unwrap_or_default(),
            items: requisition.items.iter().map(ItemRow::from_item).collect(),
            total_cost: requisition.total_cost(),
            can_edit: lifecycle::edit_mode(session, requisition).is_some(),
            can_advance: lifecycle::can_advance(session, requisition),
            next_status: requisition
                .status
                .next()
                .map(|s| s.to_string())
                .unwrap_or_default(),
            can_return: lifecycle::can_return(session, requisition),
            can_mark_bought: session.is_admin && !requisition.status.is_closed(),
        }
    }
}

#[derive(Template)]
#[template(path = "requisitions/list.html")]
struct ListTemplate {
    layout: PageContext,
    rows: Vec<RequisitionRow>,
    query: String,
    department_filter: String,
    departments: Vec<String>,
}

#[derive(Template)]
#[template(path = "requisitions/form.html")]
struct FormTemplate {
    layout: PageContext,
    error: Option<String>,
    department: String,
    requester: String,
    remarks: Vec<String>,
    selected_remarks: String,
    description: String,
    event_date: String,
    items: String,
    inventory_names: Vec<String>,
    today: String,
}

#[derive(Template)]
#[template(path = "requisitions/edit.html")]
struct EditTemplate {
    layout: PageContext,
    row: RequisitionRow,
    quantity_only: bool,
}

#[derive(Deserialize)]
pub struct ListQuery {
    q: Option<String>,
    department: Option<String>,
    notice: Option<String>,
}

#[derive(Deserialize)]
pub struct RequisitionForm {
    requester: String,
    remarks: String,
    description: Option<String>,
    event_date: Option<String>,
    items: String,
}

#[derive(Deserialize)]
pub struct RejectForm {
    branch: String,
    reason: String,
}

#[derive(Deserialize)]
pub struct BoughtForm {
    bought: Option<String>,
}

impl ListQuery {
    pub fn filter(&self, session: &Session) -> ListFilter {
        let mut filter = match &self.department {
            Some(raw) => ListFilter {
                query: String::new(),
                department: DepartmentFilter::parse(Some(raw.as_str())),
            },
            None => ListFilter::for_session(session),
        };
        filter.query = self.q.clone().unwrap_or_default();
        filter
    }
}

/// Parses `NAME, QTY, UNIT` lines into a cart. Unit is optional.
pub fn parse_item_lines(text: &str, inventory: &[InventoryItem]) -> Result<Cart, LifecycleError> {
    let mut cart = Cart::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut parts = line.splitn(3, ',').map(str::trim);
        let name = parts.next().unwrap_or_default();
        let quantity = parts
            .next()
            .ok_or_else(|| LifecycleError::InvalidQuantity(name.to_uppercase()))?
            .parse::<u32>()
            .map_err(|_| LifecycleError::InvalidQuantity(name.to_uppercase()))?;
        let unit = parts.next().unwrap_or_default();
        cart.add(name, quantity, unit, inventory)?;
    }
    Ok(cart)
}

/// A blank field means the default remark; anything else must name a known one.
fn parse_remarks(raw: &str) -> Result<RemarkType, LifecycleError> {
    match raw.trim() {
        "" => Ok(RemarkType::default()),
        raw => raw
            .parse::<RemarkType>()
            .map_err(|_| LifecycleError::UnknownRemark(raw.to_string())),
    }
}

fn edit_path(id: &str) -> String {
    format!("/requisitions/{}/edit", urlencoding::encode(id))
}

fn parse_form_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

fn over_stock_warning(items: &[crate::models::RequisitionItem], inventory: &[InventoryItem]) -> Option<String> {
    let over: Vec<&str> = items
        .iter()
        .filter(|item| exceeds_stock(&item.name, item.quantity, inventory))
        .map(|item| item.name.as_str())
        .collect();
    if over.is_empty() {
        None
    } else {
        Some(format!("Requested more than current stock: {}.", over.join(", ")))
    }
}

pub async fn requisitions_list(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let filter = query.filter(&session);

    let rows = views::list_view(&snapshot.requisitions, &filter)
        .into_iter()
        .map(|r| RequisitionRow::new(r, &session))
        .collect();

    let template = ListTemplate {
        layout: PageContext::new(&session, &snapshot, query.notice.clone(), "requisitions"),
        rows,
        query: filter.query.clone(),
        department_filter: match &filter.department {
            DepartmentFilter::All => "All".to_string(),
            DepartmentFilter::Only(department) => department.to_string(),
        },
        departments: snapshot.departments.iter().map(|d| d.to_string()).collect(),
    };
    Ok(Html(template.render()?))
}

fn render_form(
    session: &Session,
    snapshot: &crate::registry::Snapshot,
    form: Option<&RequisitionForm>,
    error: Option<String>,
) -> Result<String, AppError> {
    let today = Local::now().date_naive();
    let template = FormTemplate {
        layout: PageContext::new(session, snapshot, None, "new"),
        error,
        department: session
            .selected_department
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default(),
        requester: form.map(|f| f.requester.clone()).unwrap_or_default(),
        remarks: RemarkType::ALL.iter().map(|r| r.to_string()).collect(),
        selected_remarks: form
            .map(|f| f.remarks.clone())
            .unwrap_or_else(|| RemarkType::default().to_string()),
        description: form.and_then(|f| f.description.clone()).unwrap_or_default(),
        event_date: form.and_then(|f| f.event_date.clone()).unwrap_or_default(),
        items: form.map(|f| f.items.clone()).unwrap_or_default(),
        inventory_names: snapshot.inventory.iter().map(|i| i.name.clone()).collect(),
        today: today.to_string(),
    };
    Ok(template.render()?)
}

pub async fn requisition_form(cookies: Cookies, State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    Ok(Html(render_form(&session, &snapshot, None, None)?))
}

pub async fn create_requisition(
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<RequisitionForm>,
) -> Result<Response, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;

    let submitted = async {
        let cart = parse_item_lines(&form.items, &snapshot.inventory)?;
        let warning = over_stock_warning(cart.items(), &snapshot.inventory);
        let draft = SubmissionDraft {
            requester: form.requester.clone(),
            department: session.selected_department.clone(),
            remarks: parse_remarks(&form.remarks)?,
            description: form.description.clone(),
            event_date: parse_form_date(form.event_date.as_deref()),
            items: cart.into_items(),
        };
        let applied = state.registry.submit(draft, Local::now().date_naive()).await?;
        Ok::<_, LifecycleError>((applied, warning))
    }
    .await;

    match submitted {
        Ok((applied, warning)) => {
            let ids: Vec<&str> = applied.value.iter().map(|r| r.id.as_str()).collect();
            let mut notice = command_notice(format!("Submitted {}.", ids.join(" and ")), applied.reconciliation.as_ref());
            if let Some(warning) = warning {
                notice = format!("{} {}", notice, warning);
            }
            Ok(redirect_with_notice("/requisitions", &notice).into_response())
        }
        Err(err) if err.is_validation() => {
            let body = render_form(&session, &snapshot, Some(&form), Some(err.to_string()))?;
            Ok((StatusCode::BAD_REQUEST, Html(body)).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

fn lifecycle_notice<T>(
    result: Result<crate::registry::Applied<T>, LifecycleError>,
    done: impl FnOnce(&T) -> String,
) -> Result<String, AppError> {
    match result {
        Ok(applied) => Ok(command_notice(done(&applied.value), applied.reconciliation.as_ref())),
        Err(err) if err.is_validation() => Ok(err.to_string()),
        Err(err) => Err(err.into()),
    }
}

pub async fn advance_requisition(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let result = state.registry.advance(&session, &id).await;
    let notice = lifecycle_notice(result, |change| format!("{} moved to {}.", id, change.to))?;
    Ok(redirect_with_notice("/requisitions", &notice))
}

pub async fn reject_requisition(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<RejectForm>,
) -> Result<Redirect, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let branch = match form.branch.as_str() {
        "justification" => ReturnBranch::ForJustification,
        _ => ReturnBranch::Rejected,
    };
    let result = state
        .registry
        .return_with_reason(&session, &id, branch, &form.reason)
        .await;
    let notice = lifecycle_notice(result, |change| format!("{} marked {}.", id, change.to))?;
    Ok(redirect_with_notice("/requisitions", &notice))
}

pub async fn edit_form(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<crate::handlers::NoticeQuery>,
) -> Result<Html<String>, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let requisition = snapshot
        .requisition(&id)
        .ok_or_else(|| LifecycleError::NotFound(id.clone()))?;
    let mode = lifecycle::edit_mode(&session, requisition)
        .ok_or_else(|| LifecycleError::NotEditable(id.clone()))?;

    let template = EditTemplate {
        layout: PageContext::new(&session, &snapshot, query.notice, "requisitions"),
        row: RequisitionRow::new(requisition, &session),
        quantity_only: mode == EditMode::QuantityOnly,
    };
    Ok(Html(template.render()?))
}

/// Applies the edit form to a working copy: `remove_<item>` checkboxes, `qty_<item>` fields,
/// `description` and `new_items` lines.
pub fn apply_edit_form(
    requisition: &Requisition,
    fields: &HashMap<String, String>,
    inventory: &[InventoryItem],
) -> Result<RequisitionEdit, LifecycleError> {
    let mut edit = RequisitionEdit::from_requisition(requisition);

    for item in &requisition.items {
        if fields.contains_key(&format!("remove_{}", item.id)) {
            edit.remove_item(&item.id)?;
            continue;
        }
        if let Some(raw) = fields.get(&format!("qty_{}", item.id)) {
            let quantity = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| LifecycleError::InvalidQuantity(item.name.clone()))?;
            if quantity != item.quantity {
                edit.set_quantity(&item.id, quantity, inventory)?;
            }
        }
    }

    if let Some(description) = fields.get("description") {
        edit.description = Some(description.trim().to_string()).filter(|d| !d.is_empty());
    }
    if let Some(lines) = fields.get("new_items") {
        for item in parse_item_lines(lines, inventory)?.into_items() {
            edit.add_item(&item.name, item.quantity, &item.unit, inventory)?;
        }
    }
    Ok(edit)
}

pub async fn save_edits(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let snapshot = state.registry.snapshot().await;
    let requisition = snapshot
        .requisition(&id)
        .ok_or_else(|| LifecycleError::NotFound(id.clone()))?;

    let edit = match apply_edit_form(requisition, &fields, &snapshot.inventory) {
        Ok(edit) => edit,
        Err(err) if err.is_validation() => {
            return Ok(redirect_with_notice(&edit_path(&id), &err.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    match state.registry.save_edits(&session, &id, edit).await {
        Ok(applied) => {
            let notice = command_notice(format!("{} saved.", id), applied.reconciliation.as_ref());
            Ok(redirect_with_notice("/requisitions", &notice))
        }
        Err(err) if err.is_validation() => {
            Ok(redirect_with_notice(&edit_path(&id), &err.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn mark_bought(
    cookies: Cookies,
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, String)>,
    Form(form): Form<BoughtForm>,
) -> Result<Redirect, AppError> {
    let (session, _) = current_session(&cookies, &state.tokens);
    let bought = form.bought.is_some();
    let result = state.registry.set_bought(&session, &id, &item_id, bought).await;
    let notice = lifecycle_notice(result, |_| {
        if bought {
            format!("Item marked bought on {}.", id)
        } else {
            format!("Item marked not bought on {}.", id)
        }
    })?;
    Ok(redirect_with_notice("/requisitions", &notice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;
    use assert_matches::assert_matches;

    fn inventory() -> Vec<InventoryItem> {
        vec![InventoryItem {
            id: "1".into(),
            name: "Bath Towels".into(),
            category: "Housekeeping".into(),
            stock: 5,
            min_stock: 2,
            unit: "Pieces".into(),
            price_per_unit: Decimal::new(15, 0),
        }]
    }

    #[test]
    fn item_lines_build_a_merged_cart() {
        let cart = parse_item_lines(
            "Bath Towels, 2, pieces\n\n  tennis balls , 3\nBATH TOWELS, 1, Pieces",
            &inventory(),
        )
        .expect("cart");
        let items = cart.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].source, ItemSource::Warehouse);
        assert_eq!(items[1].name, "TENNIS BALLS");
        assert_eq!(items[1].unit, "UNITS");
    }

    #[test]
    fn malformed_quantities_are_rejected() {
        assert_matches!(
            parse_item_lines("Bath Towels", &inventory()),
            Err(LifecycleError::InvalidQuantity(name)) if name == "BATH TOWELS"
        );
        assert_matches!(
            parse_item_lines("Soap, -1", &inventory()),
            Err(LifecycleError::InvalidQuantity(_))
        );
    }

    #[test]
    fn remarks_must_name_a_known_type() {
        assert_eq!(parse_remarks("urgent").expect("remark"), RemarkType::Urgent);
        assert_eq!(parse_remarks("  ").expect("remark"), RemarkType::default());
        assert_matches!(
            parse_remarks("Whenever"),
            Err(LifecycleError::UnknownRemark(raw)) if raw == "Whenever"
        );
        assert!(LifecycleError::UnknownRemark("x".into()).is_validation());
    }

    #[test]
    fn repeated_lines_cannot_overflow_a_quantity() {
        assert_matches!(
            parse_item_lines("Towels, 4294967295\nTowels, 2", &[]),
            Err(LifecycleError::InvalidQuantity(name)) if name == "TOWELS"
        );
    }

    #[test]
    fn over_stock_names_are_listed() {
        let cart = parse_item_lines("Bath Towels, 9\nSoap, 100", &inventory()).expect("cart");
        assert_eq!(
            over_stock_warning(cart.items(), &inventory()).as_deref(),
            Some("Requested more than current stock: BATH TOWELS.")
        );
    }

    #[test]
    fn edit_form_fields_map_onto_the_edit() {
        let cart = parse_item_lines("Bath Towels, 2\nSoap, 1", &inventory()).expect("cart");
        let items = cart.into_items();
        let requisition = Requisition {
            id: "R-1".into(),
            department: "Housekeeping".into(),
            requester: "MARIA".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 2).expect("date"),
            items: items.clone(),
            status: RequestStatus::Pending,
            remarks: RemarkType::Urgent,
            description: Some("old".into()),
            event_date: None,
            rejection_reason: None,
        };

        let fields: HashMap<String, String> = [
            (format!("qty_{}", items[0].id), "4".to_string()),
            (format!("remove_{}", items[1].id), "on".to_string()),
            ("description".to_string(), "  ".to_string()),
            ("new_items".to_string(), "Shampoo, 6, bottles".to_string()),
        ]
        .into_iter()
        .collect();

        let edit = apply_edit_form(&requisition, &fields, &inventory()).expect("edit");
        assert_eq!(edit.items.len(), 2);
        assert_eq!(edit.items[0].quantity, 4);
        assert_eq!(edit.items[0].estimated_cost, Decimal::new(60, 0));
        assert_eq!(edit.items[1].name, "SHAMPOO");
        assert_eq!(edit.description, None);
    }

    #[test]
    fn explicit_department_query_overrides_session_default() {
        let session = Session::staff("Kitchen");
        let query = ListQuery {
            q: Some("towel".into()),
            department: Some("All".into()),
            notice: None,
        };
        let filter = query.filter(&session);
        assert_eq!(filter.department, DepartmentFilter::All);
        assert_eq!(filter.query, "towel");

        let defaulted = ListQuery {
            q: None,
            department: None,
            notice: None,
        };
        assert_eq!(
            defaulted.filter(&session).department,
            DepartmentFilter::Only("Kitchen".into())
        );
    }
}
