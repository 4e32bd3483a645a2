use super::Credits;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopUpStatus {
    Completed,
}

/// A confirmed payment. Keyed by the gateway reference; its existence is what
/// stops a reference from being credited twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopUpTransaction {
    #[serde(rename = "_id")]
    pub reference: String,
    pub tenant_id: String,
    pub credits: Credits,
    pub amount_minor: i64,
    pub currency: String,
    pub status: TopUpStatus,
    pub created_at: DateTime,
}

impl TopUpTransaction {
    pub fn completed(
        reference: &str,
        tenant_id: &str,
        credits: Credits,
        currency: &str,
    ) -> Self {
        Self {
            reference: reference.to_string(),
            tenant_id: tenant_id.to_string(),
            credits,
            amount_minor: credits.hundredths(),
            currency: currency.to_uppercase(),
            status: TopUpStatus::Completed,
            created_at: DateTime::now(),
        }
    }
}
