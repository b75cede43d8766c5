use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::{
    errors::LifecycleError,
    models::{Department, ItemSource, RemarkType, RequestStatus, Requisition, RequisitionItem},
};

const ID_PREFIX: &str = "SGHC";
const MIN_REQUESTER_LEN: usize = 2;

/// A request as entered, before validation and id assignment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionDraft {
    pub requester: String,
    pub department: Option<Department>,
    #[serde(default)]
    pub remarks: RemarkType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    pub items: Vec<RequisitionItem>,
}

impl SubmissionDraft {
    /// Checks every submission rule in order and reports the first one violated.
    pub fn validate(&self, departments: &[Department], today: NaiveDate) -> Result<(), LifecycleError> {
        if self.requester.trim().chars().count() < MIN_REQUESTER_LEN {
            return Err(LifecycleError::MissingRequester);
        }
        let department = self.department.as_ref().ok_or(LifecycleError::MissingDepartment)?;
        if !departments.contains(department) {
            return Err(LifecycleError::UnknownDepartment(department.to_string()));
        }
        if self.remarks == RemarkType::EventStock {
            let event_date = self.event_date.ok_or(LifecycleError::MissingEventDate)?;
            if event_date < today {
                return Err(LifecycleError::EventDateInPast);
            }
        }
        if self.items.is_empty() {
            return Err(LifecycleError::EmptyItems);
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(LifecycleError::InvalidQuantity(item.name.clone()));
        }
        Ok(())
    }
}

/// Sequential ids for one department and month, counted from a snapshot.
#[derive(Debug, Clone)]
pub struct IdSequence {
    prefix: String,
    base: usize,
    offset: usize,
}

impl IdSequence {
    pub fn new(department: &Department, month: NaiveDate, existing: &[Requisition]) -> Self {
        let base = existing
            .iter()
            .filter(|r| {
                &r.department == department
                    && r.date.year() == month.year()
                    && r.date.month() == month.month()
            })
            .count();
        Self {
            prefix: format!(
                "{} {}-{}-{:02}",
                ID_PREFIX,
                department.code(),
                month.year(),
                month.month()
            ),
            base,
            offset: 1,
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}-{:04}", self.prefix, self.base + self.offset);
        self.offset += 1;
        id
    }

    /// Like `next_id`, stepping over ids that are already in use.
    pub fn next_free_id(&mut self, taken: &HashSet<&str>) -> String {
        loop {
            let id = self.next_id();
            if !taken.contains(id.as_str()) {
                return id;
            }
        }
    }
}

/// Validates a draft and turns it into one Pending requisition per item source present,
/// warehouse items first.
pub fn build_requisitions(
    draft: SubmissionDraft,
    departments: &[Department],
    existing: &[Requisition],
    today: NaiveDate,
) -> Result<Vec<Requisition>, LifecycleError> {
    draft.validate(departments, today)?;
    let department = draft.department.ok_or(LifecycleError::MissingDepartment)?;

    let mut sequence = IdSequence::new(&department, today, existing);
    let taken: HashSet<&str> = existing.iter().map(|r| r.id.as_str()).collect();

    let requester = draft.requester.trim().to_uppercase();
    let description = draft
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let event_date = match draft.remarks {
        RemarkType::EventStock => draft.event_date,
        _ => None,
    };

    let (warehouse, purchase): (Vec<_>, Vec<_>) = draft
        .items
        .into_iter()
        .partition(|item| item.source == ItemSource::Warehouse);

    Ok([warehouse, purchase]
        .into_iter()
        .filter(|items| !items.is_empty())
        .map(|items| Requisition {
            id: sequence.next_free_id(&taken),
            department: department.clone(),
            requester: requester.clone(),
            date: today,
            items,
            status: RequestStatus::Pending,
            remarks: draft.remarks,
            description: description.clone(),
            event_date,
            rejection_reason: None,
        })
        .collect())
}
