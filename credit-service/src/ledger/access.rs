use super::LedgerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    SuperAdmin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "super_admin" | "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// The authenticated caller of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn owner(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Owner,
        }
    }

    pub fn super_admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::SuperAdmin,
        }
    }

    /// The tenant an owner acts for. Owners act only on their own account.
    pub fn tenant_id(&self) -> Result<&str, LedgerError> {
        match self.role {
            Role::Owner => Ok(&self.user_id),
            Role::SuperAdmin => Err(LedgerError::Forbidden(
                "only carwash owners can act on a carwash account",
            )),
        }
    }

    pub fn require_super_admin(&self) -> Result<(), LedgerError> {
        match self.role {
            Role::SuperAdmin => Ok(()),
            Role::Owner => Err(LedgerError::Forbidden("super admin role required")),
        }
    }
}
