use super::Credits;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A carwash business. The tenant id is the owner's principal id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantAccount {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub email: String,
    pub credits: Credits,
    pub approved: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl TenantAccount {
    /// New accounts start pending approval with the signup bonus as balance.
    pub fn new(owner_id: &str, registration: &RegisterTenant, signup_bonus: Credits) -> Self {
        let now = DateTime::now();
        Self {
            id: owner_id.to_string(),
            owner_id: owner_id.to_string(),
            name: registration.name.trim().to_string(),
            email: registration.email.trim().to_lowercase(),
            credits: signup_bonus,
            approved: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterTenant {
    #[validate(length(min = 1, max = 120, message = "Carwash name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

/// Which tenants an admin listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantFilter {
    #[default]
    All,
    Pending,
    Approved,
}

impl TenantFilter {
    pub fn matches(self, tenant: &TenantAccount) -> bool {
        match self {
            TenantFilter::All => true,
            TenantFilter::Pending => !tenant.approved,
            TenantFilter::Approved => tenant.approved,
        }
    }
}
