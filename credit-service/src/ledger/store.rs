use super::LedgerError;
use crate::models::{
    ActivityEntry, CreditAction, Credits, Expense, ExpenseDraft, Job, JobDraft, Page,
    PricingConfig, TenantAccount, TenantFilter, TopUpTransaction,
};
use async_trait::async_trait;

/// The domain record a charge pays for.
#[derive(Debug, Clone, PartialEq)]
pub enum ChargeRecord {
    Job(JobDraft),
    Expense(ExpenseDraft),
}

/// A credit-consuming write, ready to be committed by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCharge {
    pub tenant_id: String,
    pub record: ChargeRecord,
}

impl PendingCharge {
    pub fn job(draft: JobDraft) -> Self {
        Self {
            tenant_id: draft.tenant_id.clone(),
            record: ChargeRecord::Job(draft),
        }
    }

    pub fn expense(draft: ExpenseDraft) -> Self {
        Self {
            tenant_id: draft.tenant_id.clone(),
            record: ChargeRecord::Expense(draft),
        }
    }

    pub fn action(&self) -> CreditAction {
        match self.record {
            ChargeRecord::Job(_) => CreditAction::JobCard,
            ChargeRecord::Expense(_) => CreditAction::Expense,
        }
    }

    pub fn record_id(&self) -> &str {
        match &self.record {
            ChargeRecord::Job(draft) => &draft.id,
            ChargeRecord::Expense(draft) => &draft.id,
        }
    }
}

/// Result of a committed charge.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeReceipt {
    pub record_id: String,
    pub action: CreditAction,
    pub charged: Credits,
    pub balance: Credits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopUpOutcome {
    Applied { credits: Credits, balance: Credits },
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    Approved(TenantAccount),
    AlreadyApproved(TenantAccount),
}

impl ApprovalOutcome {
    pub fn tenant(&self) -> &TenantAccount {
        match self {
            ApprovalOutcome::Approved(t) | ApprovalOutcome::AlreadyApproved(t) => t,
        }
    }
}

/// Persistence for the ledger.
///
/// `commit_charge` and `commit_top_up` are each a single atomic unit: either
/// every write they describe becomes visible or none does. Implementations
/// report a lost race with a concurrent writer as [`LedgerError::Conflict`],
/// which callers may retry from the top.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Reads pricing and tenant, checks the balance covers the configured cost,
    /// then writes the record, its activity entry and the decrement together.
    ///
    /// Checks run in order: pricing exists, tenant exists, balance suffices.
    async fn commit_charge(&self, charge: &PendingCharge) -> Result<ChargeReceipt, LedgerError>;

    /// Credits a verified payment once per reference.
    async fn commit_top_up(&self, top_up: &TopUpTransaction) -> Result<TopUpOutcome, LedgerError>;

    async fn tenant(&self, tenant_id: &str) -> Result<Option<TenantAccount>, LedgerError>;

    /// Fails with `AlreadyExists` when the id is taken.
    async fn create_tenant(&self, tenant: &TenantAccount) -> Result<(), LedgerError>;

    /// Flips the approval flag and appends the admin activity entry.
    async fn approve_tenant(&self, tenant_id: &str) -> Result<ApprovalOutcome, LedgerError>;

    async fn list_tenants(&self, filter: TenantFilter) -> Result<Vec<TenantAccount>, LedgerError>;

    async fn pricing(&self) -> Result<Option<PricingConfig>, LedgerError>;

    async fn save_pricing(&self, pricing: &PricingConfig) -> Result<(), LedgerError>;

    /// Returns `true` when the pricing document was created.
    async fn insert_pricing_if_absent(&self, pricing: &PricingConfig)
        -> Result<bool, LedgerError>;

    async fn list_jobs(&self, tenant_id: &str, page: Page) -> Result<(Vec<Job>, u64), LedgerError>;

    async fn list_expenses(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<Expense>, u64), LedgerError>;

    async fn list_activities(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<ActivityEntry>, u64), LedgerError>;

    async fn list_top_ups(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<TopUpTransaction>, u64), LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}
