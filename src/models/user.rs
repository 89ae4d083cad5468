use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Back-office role, as assigned by the identity provider in front of us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaffRole {
    SuperAdmin,
    Admin,
    Receptionist,
    Cashier,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::SuperAdmin => "Super Admin",
            StaffRole::Admin => "Admin",
            StaffRole::Receptionist => "Receptionist",
            StaffRole::Cashier => "Cashier",
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "super admin" | "superadmin" => Ok(StaffRole::SuperAdmin),
            "admin" => Ok(StaffRole::Admin),
            "receptionist" => Ok(StaffRole::Receptionist),
            "cashier" => Ok(StaffRole::Cashier),
            other => Err(format!("unknown staff role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffUser {
    pub id: i64,
    pub role: StaffRole,
}
