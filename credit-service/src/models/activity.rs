use super::{Credits, Expense, Job};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    Job,
    Expense,
    TopUp,
    Admin,
}

/// Append-only audit line shown on the tenant's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub kind: ActivityKind,
    pub description: String,
    pub status: String,
    pub created_at: DateTime,
}

impl ActivityEntry {
    fn new(tenant_id: &str, kind: ActivityKind, description: String, status: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            kind,
            description,
            status: status.to_string(),
            created_at: DateTime::now(),
        }
    }

    pub fn job_created(job: &Job) -> Self {
        Self::new(
            &job.tenant_id,
            ActivityKind::Job,
            format!(
                "Created job for {} ({})",
                job.registration_plate, job.service
            ),
            "Pending",
        )
    }

    pub fn expense_recorded(expense: &Expense) -> Self {
        Self::new(
            &expense.tenant_id,
            ActivityKind::Expense,
            format!(
                "Recorded an expense of Ksh {} for {}",
                expense.amount, expense.description
            ),
            expense.category.as_str(),
        )
    }

    pub fn credits_purchased(tenant_id: &str, credits: Credits, reference: &str) -> Self {
        Self::new(
            tenant_id,
            ActivityKind::TopUp,
            format!("Purchased {} credits (ref {})", credits, reference),
            "Completed",
        )
    }

    pub fn tenant_approved(tenant_id: &str) -> Self {
        Self::new(
            tenant_id,
            ActivityKind::Admin,
            "Account approved by Super Admin".to_string(),
            "Approved",
        )
    }
}
