//! Per-browser preferences: the selected department and the admin flag.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    errors::LifecycleError,
    models::Department,
    store::RequisitionStore,
    utils::AdminTokens,
};

pub const DEPARTMENT_KEY: &str = "selected_department";
pub const ADMIN_TOKEN_KEY: &str = "admin_token";
pub const NOTIFICATION_COUNT_KEY: &str = "notification_count";

/// Durable key-value storage for preferences.
pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn save(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
    }
}

/// The acting user as far as the lifecycle is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub selected_department: Option<Department>,
    pub is_admin: bool,
}

impl Session {
    pub fn admin() -> Self {
        Session {
            selected_department: None,
            is_admin: true,
        }
    }

    pub fn staff(department: impl Into<Department>) -> Self {
        Session {
            selected_department: Some(department.into()),
            is_admin: false,
        }
    }

    /// Reads preferences; missing or invalid values fall back to no department and no admin.
    pub fn load(prefs: &dyn PreferenceStore, tokens: &AdminTokens) -> Session {
        let selected_department = prefs
            .load(DEPARTMENT_KEY)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(Department::from);
        let is_admin = prefs
            .load(ADMIN_TOKEN_KEY)
            .map(|token| tokens.verify_token(&token))
            .unwrap_or(false);

        Session {
            selected_department,
            is_admin,
        }
    }

    pub fn belongs_to(&self, department: &Department) -> bool {
        self.selected_department.as_ref() == Some(department)
    }

    /// Changes the department, which must be one of `available`. `None` clears it.
    pub fn select_department(
        &mut self,
        prefs: &dyn PreferenceStore,
        department: Option<Department>,
        available: &[Department],
    ) -> Result<(), LifecycleError> {
        match department {
            Some(department) => {
                if !available.contains(&department) {
                    return Err(LifecycleError::UnknownDepartment(department.to_string()));
                }
                prefs.save(DEPARTMENT_KEY, department.as_str());
                if self.selected_department.as_ref() != Some(&department) {
                    prefs.remove(NOTIFICATION_COUNT_KEY);
                }
                self.selected_department = Some(department);
            }
            None => {
                prefs.remove(DEPARTMENT_KEY);
                if self.selected_department.is_some() {
                    prefs.remove(NOTIFICATION_COUNT_KEY);
                }
                self.selected_department = None;
            }
        }
        Ok(())
    }

    /// Grants admin after the store accepts `secret`. Nothing changes on failure.
    pub async fn grant_admin(
        &mut self,
        prefs: &dyn PreferenceStore,
        store: &dyn RequisitionStore,
        tokens: &AdminTokens,
        secret: &str,
    ) -> Result<(), LifecycleError> {
        if !store.verify_admin_credential(secret).await? {
            log::warn!("rejected admin credential");
            return Err(LifecycleError::InvalidCredential);
        }
        let token = tokens
            .create_token()
            .map_err(|e| LifecycleError::Forbidden(format!("could not issue admin session: {}", e)))?;
        prefs.save(ADMIN_TOKEN_KEY, &token);
        prefs.remove(NOTIFICATION_COUNT_KEY);
        self.is_admin = true;
        log::info!("admin mode granted");
        Ok(())
    }

    pub fn revoke_admin(&mut self, prefs: &dyn PreferenceStore) {
        prefs.remove(ADMIN_TOKEN_KEY);
        prefs.remove(NOTIFICATION_COUNT_KEY);
        self.is_admin = false;
    }
}
