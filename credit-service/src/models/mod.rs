pub mod activity;
pub mod credits;
pub mod expense;
pub mod job;
pub mod pricing;
pub mod tenant;
pub mod top_up;

pub use activity::{ActivityEntry, ActivityKind};
pub use credits::Credits;
pub use expense::{Expense, ExpenseCategory, ExpenseDraft, NewExpense};
pub use job::{Client, ClientDetails, Job, JobDraft, JobStatus, NewJob, Vehicle, VehicleDetails};
pub use pricing::{CreditAction, PricingConfig, PricingUpdate, GLOBAL_PRICING_ID};
pub use tenant::{RegisterTenant, TenantAccount, TenantFilter};
pub use top_up::{TopUpStatus, TopUpTransaction};

/// Limit/offset window for tenant-scoped listings, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: u64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: Option<i64>, offset: Option<u64>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}
