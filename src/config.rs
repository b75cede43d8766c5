use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::views::DashboardScope;

pub const DEFAULT_ADMIN_PASSWORD: &str = "luxe123";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REFRESH_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Where requisitions and stock are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres {
        inventory_url: String,
        requisitions_url: String,
    },
    /// In-process stores seeded with example data; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub jwt_secret: String,
    pub port: u16,
    pub refresh_interval: Duration,
    pub dashboard_scope: DashboardScope,
    pub default_admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let backend = match var("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres {
                inventory_url: required("INVENTORY_DATABASE_URL")?,
                requisitions_url: required("REQUISITIONS_DATABASE_URL")?,
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let port = parse_or("PORT", var("PORT"), DEFAULT_PORT)?;
        let refresh_secs = parse_or("REFRESH_INTERVAL_SECS", var("REFRESH_INTERVAL_SECS"), DEFAULT_REFRESH_SECS)?;
        if refresh_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "REFRESH_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let dashboard_scope = match var("DASHBOARD_SCOPE") {
            Some(raw) => raw.parse::<DashboardScope>().map_err(|_| ConfigError::Invalid {
                name: "DASHBOARD_SCOPE",
                value: raw,
            })?,
            None => DashboardScope::default(),
        };

        Ok(AppConfig {
            backend,
            jwt_secret: required("JWT_SECRET")?,
            port,
            refresh_interval: Duration::from_secs(refresh_secs),
            dashboard_scope,
            default_admin_password: var("DEFAULT_ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
