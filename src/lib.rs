pub mod app;
pub mod config;
pub mod database;
pub mod errors;
pub mod filters;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod session;
pub mod store;
pub mod utils;
pub mod views;

pub use app::{create_router, AppState};
pub use config::AppConfig;
pub use errors::{AppError, LifecycleError, StoreError};
pub use registry::{Registry, ReconciliationEvent};
pub use session::Session;
