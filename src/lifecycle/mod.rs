//! Requisition lifecycle: who may move, reject or edit a requisition, and what each
//! action does to it.

pub mod cart;
pub mod submission;

use crate::{
    errors::LifecycleError,
    models::{RequestStatus, Requisition, ReturnBranch},
    session::Session,
};

pub use cart::{exceeds_stock, resolve_item, Cart, RequisitionEdit};
pub use submission::{build_requisitions, IdSequence, SubmissionDraft};

/// How much of a requisition the actor may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Items, quantities and description.
    Full,
    /// Quantities of existing items only (admin on an In Progress requisition).
    QuantityOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: RequestStatus,
    pub to: RequestStatus,
}

pub fn edit_mode(session: &Session, requisition: &Requisition) -> Option<EditMode> {
    match requisition.status {
        RequestStatus::Pending | RequestStatus::Rejected | RequestStatus::ForJustification
            if session.is_admin || session.belongs_to(&requisition.department) =>
        {
            Some(EditMode::Full)
        }
        RequestStatus::InProgress if session.is_admin => Some(EditMode::QuantityOnly),
        _ => None,
    }
}

pub fn can_advance(session: &Session, requisition: &Requisition) -> bool {
    session.is_admin && requisition.status.next().is_some()
}

pub fn can_return(session: &Session, requisition: &Requisition) -> bool {
    session.is_admin && requisition.status == RequestStatus::Pending
}

/// Moves a requisition one step along the transition table. Admin only.
pub fn advance(session: &Session, requisition: &mut Requisition) -> Result<StatusChange, LifecycleError> {
    if !session.is_admin {
        return Err(LifecycleError::Forbidden(
            "only an admin can advance a requisition".to_string(),
        ));
    }
    let from = requisition.status;
    let to = from.next().ok_or_else(|| LifecycleError::InvalidTransition {
        id: requisition.id.clone(),
        status: from.to_string(),
    })?;
    requisition.set_status(to);
    Ok(StatusChange { from, to })
}

/// Sends a Pending requisition to `Rejected` or `For Justification` with a reason.
pub fn return_with_reason(
    session: &Session,
    requisition: &mut Requisition,
    branch: ReturnBranch,
    reason: &str,
) -> Result<StatusChange, LifecycleError> {
    if !session.is_admin {
        return Err(LifecycleError::Forbidden(
            "only an admin can reject a requisition".to_string(),
        ));
    }
    if requisition.status != RequestStatus::Pending {
        return Err(LifecycleError::NotRejectable);
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LifecycleError::BlankReason);
    }

    let from = requisition.status;
    let to = branch.status();
    requisition.status = to;
    requisition.rejection_reason = Some(reason.to_string());
    Ok(StatusChange { from, to })
}

impl RequisitionEdit {
    pub fn from_requisition(requisition: &Requisition) -> Self {
        RequisitionEdit {
            items: requisition.items.clone(),
            description: requisition.description.clone(),
        }
    }
}

/// Applies an edit. A returned requisition goes back to Pending and loses its reason.
pub fn save_edits(
    session: &Session,
    requisition: &Requisition,
    edit: RequisitionEdit,
) -> Result<Requisition, LifecycleError> {
    let mode = edit_mode(session, requisition)
        .ok_or_else(|| LifecycleError::NotEditable(requisition.id.clone()))?;
    if edit.items.is_empty() {
        return Err(LifecycleError::EmptyItems);
    }
    if let Some(item) = edit.items.iter().find(|item| item.quantity == 0) {
        return Err(LifecycleError::InvalidQuantity(item.name.clone()));
    }

    let mut updated = requisition.clone();
    match mode {
        EditMode::Full => {
            updated.items = edit.items;
            updated.description = edit
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());
        }
        EditMode::QuantityOnly => {
            let same_lines = edit.items.len() == requisition.items.len()
                && edit.items.iter().zip(&requisition.items).all(|(new, old)| {
                    new.id == old.id && new.name == old.name && new.unit == old.unit
                });
            if !same_lines || edit.description != requisition.description {
                return Err(LifecycleError::QuantityOnly(requisition.id.clone()));
            }
            updated.items = edit.items;
        }
    }

    if updated.status.is_returned() {
        updated.set_status(RequestStatus::Pending);
    }
    Ok(updated)
}

/// Marks a purchase-sourced item as procured (or not). Admin only, and only while the
/// requisition is still open.
pub fn set_bought(
    session: &Session,
    requisition: &mut Requisition,
    item_id: &str,
    bought: bool,
) -> Result<(), LifecycleError> {
    if !session.is_admin {
        return Err(LifecycleError::Forbidden(
            "only an admin can mark items as bought".to_string(),
        ));
    }
    if requisition.status.is_closed() {
        return Err(LifecycleError::NotEditable(requisition.id.clone()));
    }
    let item = requisition
        .item(item_id)
        .ok_or_else(|| LifecycleError::ItemNotFound(item_id.to_string()))?;
    if item.source != crate::models::ItemSource::Purchase {
        return Err(LifecycleError::Forbidden(format!(
            "{} is drawn from the warehouse",
            item.name
        )));
    }
    if let Some(item) = requisition.items.iter_mut().find(|item| item.id == item_id) {
        item.bought = Some(bought);
    }
    Ok(())
}
