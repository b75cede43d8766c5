pub mod auth;

pub use auth::{credential_matches, hash_password, AdminTokens};
