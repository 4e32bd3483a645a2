mod common;

use async_trait::async_trait;
use common::{new_job, StubGateway};
use credit_service::ledger::{
    ApprovalOutcome, ChargeReceipt, LedgerError, LedgerService, LedgerSettings, LedgerStore,
    PendingCharge, Principal, TopUpOutcome,
};
use credit_service::models::{
    ActivityEntry, Credits, Expense, Job, Page, PricingConfig, RegisterTenant, TenantAccount,
    TenantFilter, TopUpTransaction,
};
use credit_service::services::{InMemoryLedgerStore, MockNotifier};
use service_core::retry::RetryConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Store that loses the first `conflicts` commits to a simulated write conflict.
struct FlakyStore {
    inner: InMemoryLedgerStore,
    conflicts: AtomicU32,
    commits: AtomicU32,
}

impl FlakyStore {
    fn new(inner: InMemoryLedgerStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: AtomicU32::new(conflicts),
            commits: AtomicU32::new(0),
        }
    }

    fn lose_race(&self) -> Result<(), LedgerError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(LedgerError::Conflict("write conflict".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn commit_charge(&self, charge: &PendingCharge) -> Result<ChargeReceipt, LedgerError> {
        self.lose_race()?;
        self.inner.commit_charge(charge).await
    }

    async fn commit_top_up(&self, top_up: &TopUpTransaction) -> Result<TopUpOutcome, LedgerError> {
        self.lose_race()?;
        self.inner.commit_top_up(top_up).await
    }

    async fn tenant(&self, tenant_id: &str) -> Result<Option<TenantAccount>, LedgerError> {
        self.inner.tenant(tenant_id).await
    }

    async fn create_tenant(&self, tenant: &TenantAccount) -> Result<(), LedgerError> {
        self.inner.create_tenant(tenant).await
    }

    async fn approve_tenant(&self, tenant_id: &str) -> Result<ApprovalOutcome, LedgerError> {
        self.inner.approve_tenant(tenant_id).await
    }

    async fn list_tenants(&self, filter: TenantFilter) -> Result<Vec<TenantAccount>, LedgerError> {
        self.inner.list_tenants(filter).await
    }

    async fn pricing(&self) -> Result<Option<PricingConfig>, LedgerError> {
        self.inner.pricing().await
    }

    async fn save_pricing(&self, pricing: &PricingConfig) -> Result<(), LedgerError> {
        self.inner.save_pricing(pricing).await
    }

    async fn insert_pricing_if_absent(
        &self,
        pricing: &PricingConfig,
    ) -> Result<bool, LedgerError> {
        self.inner.insert_pricing_if_absent(pricing).await
    }

    async fn list_jobs(&self, tenant_id: &str, page: Page) -> Result<(Vec<Job>, u64), LedgerError> {
        self.inner.list_jobs(tenant_id, page).await
    }

    async fn list_expenses(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<Expense>, u64), LedgerError> {
        self.inner.list_expenses(tenant_id, page).await
    }

    async fn list_activities(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<ActivityEntry>, u64), LedgerError> {
        self.inner.list_activities(tenant_id, page).await
    }

    async fn list_top_ups(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<TopUpTransaction>, u64), LedgerError> {
        self.inner.list_top_ups(tenant_id, page).await
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        self.inner.health_check().await
    }
}

async fn flaky_ledger(
    conflicts: u32,
    retry: RetryConfig,
) -> (LedgerService, Arc<FlakyStore>, Arc<StubGateway>) {
    let inner = InMemoryLedgerStore::new();
    inner
        .save_pricing(&PricingConfig::default())
        .await
        .unwrap();

    let mut tenant = TenantAccount::new(
        "owner-a",
        &RegisterTenant {
            name: "Sparkle Wash".to_string(),
            email: "owner@example.com".to_string(),
        },
        Credits::from_whole(10),
    );
    tenant.approved = true;
    inner.create_tenant(&tenant).await.unwrap();

    let store = Arc::new(FlakyStore::new(inner, conflicts));
    let gateway = Arc::new(StubGateway::new());
    let ledger = LedgerService::new(
        store.clone(),
        gateway.clone(),
        Arc::new(MockNotifier::new()),
        LedgerSettings::default(),
        retry,
    );
    (ledger, store, gateway)
}

#[tokio::test]
async fn charge_is_retried_after_conflict() {
    let (ledger, store, _) = flaky_ledger(2, RetryConfig::quick()).await;
    let owner = Principal::owner("owner-a");

    let receipt = ledger.create_job(&owner, new_job("KCA 123A")).await.unwrap();

    assert_eq!(receipt.balance, Credits::from_hundredths(850));
    assert_eq!(store.commits.load(Ordering::SeqCst), 3);

    let (jobs, _) = ledger.list_jobs(&owner, Page::default()).await.unwrap();
    assert_eq!(jobs.len(), 1);
}

#[tokio::test]
async fn conflict_surfaces_after_retries_are_exhausted() {
    let retry = RetryConfig {
        max_retries: 1,
        ..RetryConfig::quick()
    };
    let (ledger, store, _) = flaky_ledger(5, retry).await;
    let owner = Principal::owner("owner-a");

    let err = ledger.create_job(&owner, new_job("KCA 123A")).await;
    assert!(matches!(err, Err(LedgerError::Conflict(_))));
    assert_eq!(store.commits.load(Ordering::SeqCst), 2);

    let account = ledger.account(&owner).await.unwrap();
    assert_eq!(account.credits, Credits::from_whole(10));
}

#[tokio::test]
async fn insufficient_credits_is_not_retried() {
    let (ledger, store, _) = flaky_ledger(0, RetryConfig::quick()).await;
    let owner = Principal::owner("owner-a");
    ledger
        .update_pricing(
            &Principal::super_admin("admin-1"),
            credit_service::models::PricingUpdate {
                job_card_cost: 50.0,
                expense_cost: 0.5,
                min_top_up: 50.0,
            },
        )
        .await
        .unwrap();

    let err = ledger.create_job(&owner, new_job("KCA 123A")).await;
    assert!(matches!(err, Err(LedgerError::InsufficientCredits { .. })));
    assert_eq!(store.commits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn top_up_is_retried_and_still_applied_once() {
    let (ledger, store, gateway) = flaky_ledger(1, RetryConfig::quick()).await;
    let owner = Principal::owner("owner-a");
    gateway.settle("ref-flaky", "owner-a", 1_000, "KES");

    let outcome = ledger.confirm_top_up(&owner, "ref-flaky").await.unwrap();
    assert_eq!(
        outcome,
        TopUpOutcome::Applied {
            credits: Credits::from_whole(10),
            balance: Credits::from_whole(20),
        }
    );
    assert_eq!(store.commits.load(Ordering::SeqCst), 2);
    // The gateway is asked once; only the commit is re-run.
    assert_eq!(gateway.verify_calls(), 1);
}
