use std::fmt;

use serde::{Deserialize, Serialize};

/// Built-in department list, used when the registry has no `system_config` document.
pub const DEFAULT_DEPARTMENTS: [&str; 13] = [
    "Housekeeping",
    "F&B Service",
    "Kitchen",
    "Front Office",
    "Finance",
    "Laundry",
    "Purchasing",
    "Human Resource",
    "Admin",
    "Sports & Recreations",
    "Reservation",
    "POMEC",
    "Security",
];

const DEPARTMENT_CODES: [(&str, &str); 17] = [
    ("Admin", "ADM"),
    ("Cafeteria", "CAF"),
    ("Finance", "FIN"),
    ("F&B Service", "FNB"),
    ("Front Office", "FRO"),
    ("Front Office-Airport Lounge", "FAL"),
    ("Front Office-Kanaten", "FOK"),
    ("Housekeeping", "HOU"),
    ("Human Resource", "HRM"),
    ("Laundry", "LAU"),
    ("Kitchen", "MK"),
    ("POMEC", "POM"),
    ("Purchasing", "PUR"),
    ("Reservation", "RES"),
    ("Security", "SEC"),
    ("Sports & Recreations", "SNR"),
    ("Information Technology", "IT"),
];

/// A hotel department. The set of valid names is configuration, not a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Department(String);

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        Department(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Code used in requisition ids. Unknown departments use the first three letters.
    pub fn code(&self) -> String {
        DEPARTMENT_CODES
            .iter()
            .find(|(name, _)| *name == self.0)
            .map(|(_, code)| code.to_string())
            .unwrap_or_else(|| self.0.chars().take(3).collect::<String>().to_uppercase())
    }

    pub fn defaults() -> Vec<Department> {
        DEFAULT_DEPARTMENTS.iter().map(|name| Department::from(*name)).collect()
    }
}

impl From<&str> for Department {
    fn from(name: &str) -> Self {
        Department(name.to_string())
    }
}

impl From<String> for Department {
    fn from(name: String) -> Self {
        Department(name)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
