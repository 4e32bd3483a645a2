//! JSON request and response bodies for the HTTP API.
//!
//! Credit amounts are exposed as decimal numbers (`1.5`) and timestamps as
//! RFC 3339 strings.

use crate::ledger::{ApprovalOutcome, ChargeReceipt, Checkout, TopUpOutcome};
use crate::models::{
    ActivityEntry, ActivityKind, Expense, ExpenseCategory, Job, JobStatus, Page, PricingConfig,
    TenantAccount, TenantFilter, TopUpTransaction,
};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

fn timestamp(value: DateTime) -> String {
    value.to_chrono().to_rfc3339()
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        Page::new(query.limit, query.offset)
    }
}

#[derive(Debug, Deserialize)]
pub struct TenantListQuery {
    #[serde(default)]
    pub status: TenantFilter,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> ListResponse<T> {
    pub fn from_page<R>((records, total): (Vec<R>, u64)) -> Self
    where
        T: From<R>,
    {
        Self {
            items: records.into_iter().map(T::from).collect(),
            total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub tenant_id: String,
    pub name: String,
    pub email: String,
    pub credits: f64,
    pub approved: bool,
    pub created_at: String,
}

impl From<TenantAccount> for AccountResponse {
    fn from(tenant: TenantAccount) -> Self {
        Self {
            tenant_id: tenant.id,
            name: tenant.name,
            email: tenant.email,
            credits: tenant.credits.as_f64(),
            approved: tenant.approved,
            created_at: timestamp(tenant.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub tenant: AccountResponse,
    pub already_approved: bool,
}

impl From<ApprovalOutcome> for ApprovalResponse {
    fn from(outcome: ApprovalOutcome) -> Self {
        match outcome {
            ApprovalOutcome::Approved(tenant) => Self {
                tenant: tenant.into(),
                already_approved: false,
            },
            ApprovalOutcome::AlreadyApproved(tenant) => Self {
                tenant: tenant.into(),
                already_approved: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    pub id: String,
    pub charged: f64,
    pub balance: f64,
}

impl From<ChargeReceipt> for ChargeResponse {
    fn from(receipt: ChargeReceipt) -> Self {
        Self {
            id: receipt.record_id,
            charged: receipt.charged.as_f64(),
            balance: receipt.balance.as_f64(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub client_id: String,
    pub vehicle_id: String,
    pub client_phone_number: String,
    pub registration_plate: String,
    pub service: String,
    pub price: f64,
    pub duration_minutes: u32,
    pub status: JobStatus,
    pub charged: f64,
    pub created_at: String,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            client_id: job.client_id,
            vehicle_id: job.vehicle_id,
            client_phone_number: job.client_phone_number,
            registration_plate: job.registration_plate,
            service: job.service,
            price: job.price,
            duration_minutes: job.duration_minutes,
            status: job.status,
            charged: job.charged.as_f64(),
            created_at: timestamp(job.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    pub id: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub team_member_name: Option<String>,
    pub charged: f64,
}

impl From<Expense> for ExpenseResponse {
    fn from(expense: Expense) -> Self {
        Self {
            id: expense.id,
            category: expense.category,
            description: expense.description,
            amount: expense.amount,
            date: timestamp(expense.date),
            team_member_name: expense.team_member_name,
            charged: expense.charged.as_f64(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    pub status: String,
    pub created_at: String,
}

impl From<ActivityEntry> for ActivityResponse {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind,
            description: entry.description,
            status: entry.status,
            created_at: timestamp(entry.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub reference: String,
    pub credits: f64,
    pub currency: String,
    pub created_at: String,
}

impl From<TopUpTransaction> for TopUpResponse {
    fn from(top_up: TopUpTransaction) -> Self {
        Self {
            reference: top_up.reference,
            credits: top_up.credits.as_f64(),
            currency: top_up.currency,
            created_at: timestamp(top_up.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub job_card_cost: f64,
    pub expense_cost: f64,
    pub min_top_up: f64,
    pub updated_at: String,
}

impl From<PricingConfig> for PricingResponse {
    fn from(pricing: PricingConfig) -> Self {
        Self {
            job_card_cost: pricing.job_card_cost.as_f64(),
            expense_cost: pricing.expense_cost.as_f64(),
            min_top_up: pricing.min_top_up.as_f64(),
            updated_at: timestamp(pricing.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutBody {
    /// Credits to buy.
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
    pub credits: f64,
    pub amount_minor: u64,
    pub currency: String,
}

impl From<Checkout> for CheckoutResponse {
    fn from(checkout: Checkout) -> Self {
        Self {
            reference: checkout.reference,
            authorization_url: checkout.authorization_url,
            access_code: checkout.access_code,
            credits: checkout.credits.as_f64(),
            amount_minor: checkout.amount_minor,
            currency: checkout.currency,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyTopUpBody {
    #[validate(length(min = 1, max = 100, message = "Payment reference is required"))]
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyTopUpResponse {
    pub success: bool,
    pub already_applied: bool,
    pub credits: f64,
    pub balance: Option<f64>,
    pub message: String,
}

impl From<TopUpOutcome> for VerifyTopUpResponse {
    fn from(outcome: TopUpOutcome) -> Self {
        match outcome {
            TopUpOutcome::Applied { credits, balance } => Self {
                success: true,
                already_applied: false,
                credits: credits.as_f64(),
                balance: Some(balance.as_f64()),
                message: "Payment verified and credits added.".to_string(),
            },
            TopUpOutcome::AlreadyApplied => Self {
                success: true,
                already_applied: true,
                credits: 0.0,
                balance: None,
                message: "Payment already processed.".to_string(),
            },
        }
    }
}
