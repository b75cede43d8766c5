use chrono::NaiveDate;
use serde_json::Value;

use crate::{
    errors::StoreError,
    models::{Department, RemarkType, RequestStatus, Requisition, RequisitionItem, RequisitionRecord},
};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// Decodes an items blob. A broken blob degrades to an empty list and is logged.
pub fn decode_items(requisition_id: &str, blob: Option<&str>) -> Vec<RequisitionItem> {
    let Some(raw) = blob.filter(|raw| !raw.trim().is_empty()) else {
        return Vec::new();
    };
    let parsed = serde_json::from_str::<Value>(raw).and_then(|mut value| {
        normalize_booleans(&mut value);
        serde_json::from_value::<Vec<RequisitionItem>>(value)
    });
    match parsed {
        Ok(items) => items,
        Err(err) => {
            log::error!("failed to decode items of requisition {}: {}", requisition_id, err);
            Vec::new()
        }
    }
}

pub fn encode_items(items: &[RequisitionItem]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(items)?)
}

// Older clients wrote `bought` as "yes"/"no".
fn normalize_booleans(value: &mut Value) {
    let Value::Array(items) = value else {
        return;
    };
    for item in items.iter_mut() {
        let Some(bought) = item.get_mut("bought") else {
            continue;
        };
        let normalized = match bought {
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "y" | "1" => Value::Bool(true),
                "no" | "false" | "n" | "0" | "" => Value::Bool(false),
                _ => continue,
            },
            Value::Number(n) => Value::Bool(n.as_f64().map_or(false, |f| f != 0.0)),
            _ => continue,
        };
        *bought = normalized;
    }
}

pub fn encode_record(requisition: &Requisition) -> Result<RequisitionRecord, StoreError> {
    Ok(RequisitionRecord {
        id: requisition.id.clone(),
        department: Some(requisition.department.to_string()),
        requester: Some(requisition.requester.clone()),
        date: Some(format_date(requisition.date)),
        status: Some(requisition.status.to_string()),
        remarks: Some(requisition.remarks.to_string()),
        description: Some(requisition.description.clone().unwrap_or_default()),
        items: Some(encode_items(&requisition.items)?),
        event_date: requisition.event_date.map(format_date),
        rejection_reason: requisition.rejection_reason.clone(),
    })
}

/// Turns a stored row into a requisition. Only item decoding is tolerant; a row missing
/// its department, date, status or remark cannot be represented and is reported.
pub fn decode_record(record: RequisitionRecord) -> Result<Requisition, String> {
    let id = record.id;
    let department = record
        .department
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| format!("requisition {} has no department", id))?;
    let date = record
        .date
        .as_deref()
        .and_then(parse_date)
        .ok_or_else(|| format!("requisition {} has no readable date", id))?;
    let status = record
        .status
        .as_deref()
        .unwrap_or_default()
        .parse::<RequestStatus>()
        .map_err(|err| format!("requisition {}: {}", id, err))?;
    let remarks = record
        .remarks
        .as_deref()
        .unwrap_or_default()
        .parse::<RemarkType>()
        .map_err(|err| format!("requisition {}: {}", id, err))?;
    let items = decode_items(&id, record.items.as_deref());

    Ok(Requisition {
        department: Department::from(department),
        requester: record.requester.unwrap_or_default(),
        date,
        items,
        status,
        remarks,
        description: record.description.filter(|d| !d.trim().is_empty()),
        event_date: record.event_date.as_deref().and_then(parse_date),
        rejection_reason: record.rejection_reason.filter(|r| !r.trim().is_empty()),
        id,
    })
}

/// Decodes a batch of rows, skipping (and logging) rows that cannot be represented.
pub fn decode_records(records: Vec<RequisitionRecord>) -> Vec<Requisition> {
    records
        .into_iter()
        .filter_map(|record| match decode_record(record) {
            Ok(requisition) => Some(requisition),
            Err(err) => {
                log::error!("skipping unreadable requisition row: {}", err);
                None
            }
        })
        .collect()
}
