//! In-process ledger store.
//!
//! One async mutex is held across each whole read-validate-write procedure,
//! so procedures are serialized and every check runs before any mutation.
//! Used by the test suite and for local runs without a database.

use crate::ledger::{
    ApprovalOutcome, ChargeReceipt, ChargeRecord, LedgerError, LedgerStore, PendingCharge,
    TopUpOutcome,
};
use crate::models::{
    ActivityEntry, Client, Credits, Expense, Job, JobDraft, Page, PricingConfig, TenantAccount,
    TenantFilter, TopUpTransaction, Vehicle,
};
use async_trait::async_trait;
use mongodb::bson::DateTime;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct LedgerState {
    pricing: Option<PricingConfig>,
    tenants: HashMap<String, TenantAccount>,
    clients: Vec<Client>,
    vehicles: Vec<Vehicle>,
    jobs: Vec<Job>,
    expenses: Vec<Expense>,
    top_ups: Vec<TopUpTransaction>,
    activities: Vec<ActivityEntry>,
}

#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest-first slice of the records belonging to `tenant_id`.
fn page_of<T: Clone>(
    records: &[T],
    tenant_id: &str,
    owner: impl Fn(&T) -> &str,
    page: Page,
) -> (Vec<T>, u64) {
    let owned: Vec<&T> = records
        .iter()
        .rev()
        .filter(|r| owner(*r) == tenant_id)
        .collect();
    let items = owned
        .iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .map(|r| (*r).clone())
        .collect();
    (items, owned.len() as u64)
}

impl LedgerState {
    fn upsert_client(&mut self, tenant_id: &str, job: &JobDraft) -> String {
        let existing = self
            .clients
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.phone_number == job.client.phone_number);
        match existing {
            Some(client) => {
                client.name = job.client.name.clone();
                if job.client.email.is_some() {
                    client.email = job.client.email.clone();
                }
                client.updated_at = DateTime::now();
                client.id.clone()
            }
            None => {
                let client = job.new_client();
                let id = client.id.clone();
                self.clients.push(client);
                id
            }
        }
    }

    fn upsert_vehicle(
        &mut self,
        tenant_id: &str,
        client_id: &str,
        job: &JobDraft,
    ) -> String {
        let existing = self.vehicles.iter().find(|v| {
            v.tenant_id == tenant_id
                && v.client_id == client_id
                && v.registration_plate == job.vehicle.registration_plate
        });
        match existing {
            Some(vehicle) => vehicle.id.clone(),
            None => {
                let vehicle = job.new_vehicle(client_id);
                let id = vehicle.id.clone();
                self.vehicles.push(vehicle);
                id
            }
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit_charge(&self, charge: &PendingCharge) -> Result<ChargeReceipt, LedgerError> {
        let mut state = self.state.lock().await;
        let action = charge.action();

        let cost = state
            .pricing
            .as_ref()
            .ok_or(LedgerError::ConfigurationMissing)?
            .cost_of(action);
        let available = state
            .tenants
            .get(&charge.tenant_id)
            .ok_or(LedgerError::TenantNotFound)?
            .credits;
        let balance = available
            .checked_sub(cost)
            .filter(|b| *b >= Credits::ZERO)
            .ok_or(LedgerError::InsufficientCredits {
                action,
                required: cost,
                available,
            })?;

        let activity = match &charge.record {
            ChargeRecord::Job(draft) => {
                let client_id = state.upsert_client(&charge.tenant_id, draft);
                let vehicle_id = state.upsert_vehicle(&charge.tenant_id, &client_id, draft);
                let job = draft.clone().into_job(client_id, vehicle_id, cost);
                let activity = ActivityEntry::job_created(&job);
                state.jobs.push(job);
                activity
            }
            ChargeRecord::Expense(draft) => {
                let expense = draft.clone().into_expense(cost);
                let activity = ActivityEntry::expense_recorded(&expense);
                state.expenses.push(expense);
                activity
            }
        };
        state.activities.push(activity);

        if let Some(tenant) = state.tenants.get_mut(&charge.tenant_id) {
            tenant.credits = balance;
            tenant.updated_at = DateTime::now();
        }

        Ok(ChargeReceipt {
            record_id: charge.record_id().to_string(),
            action,
            charged: cost,
            balance,
        })
    }

    async fn commit_top_up(&self, top_up: &TopUpTransaction) -> Result<TopUpOutcome, LedgerError> {
        let mut state = self.state.lock().await;

        if state
            .top_ups
            .iter()
            .any(|t| t.reference == top_up.reference)
        {
            return Ok(TopUpOutcome::AlreadyApplied);
        }

        let tenant = state
            .tenants
            .get_mut(&top_up.tenant_id)
            .ok_or(LedgerError::TenantNotFound)?;
        let balance = tenant
            .credits
            .checked_add(top_up.credits)
            .ok_or_else(|| LedgerError::InvalidInput("balance overflow".to_string()))?;
        tenant.credits = balance;
        tenant.updated_at = DateTime::now();

        state.top_ups.push(top_up.clone());
        state.activities.push(ActivityEntry::credits_purchased(
            &top_up.tenant_id,
            top_up.credits,
            &top_up.reference,
        ));

        Ok(TopUpOutcome::Applied {
            credits: top_up.credits,
            balance,
        })
    }

    async fn tenant(&self, tenant_id: &str) -> Result<Option<TenantAccount>, LedgerError> {
        Ok(self.state.lock().await.tenants.get(tenant_id).cloned())
    }

    async fn create_tenant(&self, tenant: &TenantAccount) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if state.tenants.contains_key(&tenant.id) {
            return Err(LedgerError::AlreadyExists("Carwash account"));
        }
        state.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn approve_tenant(&self, tenant_id: &str) -> Result<ApprovalOutcome, LedgerError> {
        let mut state = self.state.lock().await;
        let tenant = state
            .tenants
            .get_mut(tenant_id)
            .ok_or(LedgerError::TenantNotFound)?;

        if tenant.approved {
            return Ok(ApprovalOutcome::AlreadyApproved(tenant.clone()));
        }

        tenant.approved = true;
        tenant.updated_at = DateTime::now();
        let approved = tenant.clone();
        state
            .activities
            .push(ActivityEntry::tenant_approved(tenant_id));

        Ok(ApprovalOutcome::Approved(approved))
    }

    async fn list_tenants(&self, filter: TenantFilter) -> Result<Vec<TenantAccount>, LedgerError> {
        let state = self.state.lock().await;
        let mut tenants: Vec<TenantAccount> = state
            .tenants
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tenants.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(tenants)
    }

    async fn pricing(&self) -> Result<Option<PricingConfig>, LedgerError> {
        Ok(self.state.lock().await.pricing.clone())
    }

    async fn save_pricing(&self, pricing: &PricingConfig) -> Result<(), LedgerError> {
        self.state.lock().await.pricing = Some(pricing.clone());
        Ok(())
    }

    async fn insert_pricing_if_absent(
        &self,
        pricing: &PricingConfig,
    ) -> Result<bool, LedgerError> {
        let mut state = self.state.lock().await;
        if state.pricing.is_some() {
            return Ok(false);
        }
        state.pricing = Some(pricing.clone());
        Ok(true)
    }

    async fn list_jobs(&self, tenant_id: &str, page: Page) -> Result<(Vec<Job>, u64), LedgerError> {
        let state = self.state.lock().await;
        Ok(page_of(&state.jobs, tenant_id, |j| j.tenant_id.as_str(), page))
    }

    async fn list_expenses(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<Expense>, u64), LedgerError> {
        let state = self.state.lock().await;
        let mut expenses = state.expenses.clone();
        // Stable sort keeps insertion order between expenses on the same date.
        expenses.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(page_of(&expenses, tenant_id, |e| e.tenant_id.as_str(), page))
    }

    async fn list_activities(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<ActivityEntry>, u64), LedgerError> {
        let state = self.state.lock().await;
        Ok(page_of(&state.activities, tenant_id, |a| a.tenant_id.as_str(), page))
    }

    async fn list_top_ups(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<TopUpTransaction>, u64), LedgerError> {
        let state = self.state.lock().await;
        Ok(page_of(&state.top_ups, tenant_id, |t| t.tenant_id.as_str(), page))
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
