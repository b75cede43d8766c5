use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

/// Failures raised by the inventory and requisition stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("requisition {0} not found")]
    NotFound(String),
    #[error("requisition id {0} is already taken")]
    Conflict(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Serialization(err.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Rule violations and authorization failures of the requisition lifecycle.
///
/// Every validation variant carries a message meant to be shown to the user as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Requester name must be at least 2 characters")]
    MissingRequester,
    #[error("Please select a department in settings")]
    MissingDepartment,
    #[error("Department '{0}' is not configured")]
    UnknownDepartment(String),
    #[error("At least one item is required")]
    EmptyItems,
    #[error("Item name is required")]
    MissingItemName,
    #[error("Quantity for {0} must be a positive whole number")]
    InvalidQuantity(String),
    #[error("Unknown remark '{0}'")]
    UnknownRemark(String),
    #[error("Event date is required for Event Stock requests")]
    MissingEventDate,
    #[error("Event date cannot be in the past")]
    EventDateInPast,
    #[error("A reason is required to reject or return a requisition")]
    BlankReason,
    #[error("Only Pending requisitions can be rejected or returned for justification")]
    NotRejectable,
    #[error("Invalid admin credential")]
    InvalidCredential,
    #[error("Not permitted: {0}")]
    Forbidden(String),
    #[error("Requisition {id} cannot move on from {status}")]
    InvalidTransition { id: String, status: String },
    #[error("Requisition {0} cannot be edited in its current state")]
    NotEditable(String),
    #[error("Only quantities can be changed on requisition {0}")]
    QuantityOnly(String),
    #[error("Requisition {0} not found")]
    NotFound(String),
    #[error("Item {0} not found")]
    ItemNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LifecycleError::MissingRequester
                | LifecycleError::MissingDepartment
                | LifecycleError::UnknownDepartment(_)
                | LifecycleError::EmptyItems
                | LifecycleError::MissingItemName
                | LifecycleError::InvalidQuantity(_)
                | LifecycleError::UnknownRemark(_)
                | LifecycleError::MissingEventDate
                | LifecycleError::EventDateInPast
                | LifecycleError::BlankReason
                | LifecycleError::QuantityOnly(_)
        )
    }
}

/// Handler-level error, rendered as a plain HTML error page.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Lifecycle(LifecycleError::Store(err)) | AppError::Store(err) => {
                store_status(err)
            }
            AppError::Lifecycle(err) if err.is_validation() => StatusCode::BAD_REQUEST,
            AppError::Lifecycle(LifecycleError::InvalidCredential)
            | AppError::Lifecycle(LifecycleError::Forbidden(_))
            | AppError::Lifecycle(LifecycleError::NotEditable(_)) => StatusCode::FORBIDDEN,
            AppError::Lifecycle(LifecycleError::NotFound(_))
            | AppError::Lifecycle(LifecycleError::ItemNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Lifecycle(LifecycleError::InvalidTransition { .. })
            | AppError::Lifecycle(LifecycleError::NotRejectable) => StatusCode::CONFLICT,
            AppError::Lifecycle(_) | AppError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        let body = format!(
            "<!doctype html><title>{code}</title><h1>{code}</h1><p>{message}</p><p><a href=\"/dashboard\">Back</a></p>",
            code = status,
            message = escape_html(&self.to_string()),
        );
        (status, Html(body)).into_response()
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
