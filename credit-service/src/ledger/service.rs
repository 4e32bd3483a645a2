use super::{
    ApprovalOutcome, ChargeReceipt, LedgerError, LedgerStore, PendingCharge, Principal,
    TopUpOutcome,
};
use crate::config::LedgerConfig;
use crate::models::{
    ActivityEntry, Credits, Expense, ExpenseDraft, Job, JobDraft, NewExpense, NewJob, Page,
    PricingConfig, PricingUpdate, RegisterTenant, TenantAccount, TenantFilter, TopUpTransaction,
};
use crate::services::metrics::{
    CONFLICT_RETRIES_TOTAL, CREDITS_CONSUMED_TOTAL, CREDITS_PURCHASED_TOTAL,
    CREDIT_CHARGES_TOTAL, TOP_UPS_TOTAL,
};
use crate::services::notifier::{approval_email, welcome_email, EmailMessage, Notifier};
use crate::services::paystack::{
    CheckoutRequest, GatewayError, PaymentGateway, WebhookEvent,
};
use service_core::retry::{retry_with_backoff, RetryConfig};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

const CHARGE_SUCCESS_EVENT: &str = "charge.success";

/// Tunables for the ledger procedures.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub operating_currency: String,
    pub signup_bonus: Credits,
    pub login_url: String,
}

impl LedgerSettings {
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            operating_currency: config.operating_currency.clone(),
            signup_bonus: config.signup_bonus,
            login_url: config.login_url.clone(),
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            operating_currency: "KES".to_string(),
            signup_bonus: Credits::from_whole(200),
            login_url: "http://localhost:3000/carwash-login".to_string(),
        }
    }
}

/// A checkout opened with the gateway for a credit purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    pub reference: String,
    pub authorization_url: String,
    pub access_code: String,
    pub credits: Credits,
    pub amount_minor: u64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Processed(TopUpOutcome),
    /// Authentic event that carries nothing to apply.
    Ignored(&'static str),
    /// Authentic event that failed a business rule; retrying will not help.
    Rejected(String),
}

/// Ledger operations for carwash owners, the super admin and the gateway.
///
/// Owners act only on their own tenant. While a tenant is pending approval
/// its owner can read the account and buy credits, but every
/// credit-consuming and domain-listing operation fails with
/// [`LedgerError::PendingApproval`].
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    settings: LedgerSettings,
    retry: RetryConfig,
}

impl LedgerService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: LedgerSettings,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            settings,
            retry,
        }
    }

    pub async fn health_check(&self) -> Result<(), LedgerError> {
        self.store.health_check().await
    }

    // ---------------------------------------------------------------------
    // Credit-metered actions
    // ---------------------------------------------------------------------

    #[instrument(skip(self, job), fields(user_id = %principal.user_id))]
    pub async fn create_job(
        &self,
        principal: &Principal,
        job: NewJob,
    ) -> Result<ChargeReceipt, LedgerError> {
        job.validate()?;
        let tenant_id = principal.tenant_id()?;
        self.ensure_not_pending(tenant_id).await?;

        self.charge(PendingCharge::job(JobDraft::new(tenant_id, job)))
            .await
    }

    #[instrument(skip(self, expense), fields(user_id = %principal.user_id))]
    pub async fn record_expense(
        &self,
        principal: &Principal,
        expense: NewExpense,
    ) -> Result<ChargeReceipt, LedgerError> {
        expense.validate()?;
        let tenant_id = principal.tenant_id()?;
        self.ensure_not_pending(tenant_id).await?;

        let draft = ExpenseDraft::new(tenant_id, expense)
            .map_err(|reason| LedgerError::InvalidInput(reason.to_string()))?;
        self.charge(PendingCharge::expense(draft)).await
    }

    async fn charge(&self, charge: PendingCharge) -> Result<ChargeReceipt, LedgerError> {
        let action = charge.action().as_str();
        let store = &self.store;
        let pending = &charge;

        let result = self
            .retrying("commit_charge", move || store.commit_charge(pending))
            .await;

        match &result {
            Ok(receipt) => {
                CREDIT_CHARGES_TOTAL.with_label_values(&[action, "ok"]).inc();
                CREDITS_CONSUMED_TOTAL
                    .with_label_values(&[action])
                    .inc_by(receipt.charged.as_f64());
                info!(
                    tenant_id = %charge.tenant_id,
                    record_id = %receipt.record_id,
                    action,
                    charged = %receipt.charged,
                    balance = %receipt.balance,
                    "Credits charged"
                );
            }
            Err(LedgerError::InsufficientCredits {
                required,
                available,
                ..
            }) => {
                CREDIT_CHARGES_TOTAL
                    .with_label_values(&[action, "insufficient"])
                    .inc();
                info!(
                    tenant_id = %charge.tenant_id,
                    action,
                    required = %required,
                    available = %available,
                    "Charge rejected for insufficient credits"
                );
            }
            Err(e) => {
                CREDIT_CHARGES_TOTAL
                    .with_label_values(&[action, "error"])
                    .inc();
                warn!(tenant_id = %charge.tenant_id, action, error = %e, "Charge failed");
            }
        }

        result
    }

    // ---------------------------------------------------------------------
    // Credit purchases
    // ---------------------------------------------------------------------

    /// Opens a gateway checkout for `amount` credits after checking the
    /// platform minimum.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn begin_top_up(
        &self,
        principal: &Principal,
        amount: f64,
    ) -> Result<Checkout, LedgerError> {
        let tenant_id = principal.tenant_id()?;
        let credits = Credits::from_decimal(amount)
            .filter(|c| !c.is_zero())
            .ok_or_else(|| {
                LedgerError::InvalidInput("Top-up amount must be a positive number".to_string())
            })?;

        let pricing = self
            .store
            .pricing()
            .await?
            .ok_or(LedgerError::ConfigurationMissing)?;
        if credits < pricing.min_top_up {
            return Err(LedgerError::BelowMinimumTopUp {
                minimum: pricing.min_top_up,
            });
        }

        let tenant = self
            .store
            .tenant(tenant_id)
            .await?
            .ok_or(LedgerError::TenantNotFound)?;

        let request = CheckoutRequest {
            reference: new_reference(),
            email: tenant.email,
            amount_minor: credits.to_minor_units(),
            currency: self.settings.operating_currency.clone(),
            tenant_id: tenant_id.to_string(),
        };
        let session = self
            .gateway
            .initialize(&request)
            .await
            .map_err(|e| LedgerError::Gateway(e.to_string()))?;

        info!(tenant_id, reference = %session.reference, credits = %credits, "Checkout opened");

        Ok(Checkout {
            reference: session.reference,
            authorization_url: session.authorization_url,
            access_code: session.access_code,
            credits,
            amount_minor: request.amount_minor,
            currency: request.currency,
        })
    }

    /// Owner-initiated confirmation after returning from checkout.
    #[instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn confirm_top_up(
        &self,
        principal: &Principal,
        reference: &str,
    ) -> Result<TopUpOutcome, LedgerError> {
        let tenant_id = principal.tenant_id()?;
        self.apply_verified_payment(tenant_id, reference).await
    }

    /// Confirmation on behalf of a tenant, as driven by gateway webhooks.
    #[instrument(skip(self))]
    pub async fn confirm_top_up_for_tenant(
        &self,
        tenant_id: &str,
        reference: &str,
    ) -> Result<TopUpOutcome, LedgerError> {
        self.apply_verified_payment(tenant_id, reference).await
    }

    /// Verifies `reference` with the gateway, then credits it at most once.
    ///
    /// Only the gateway's own report decides the amount and currency.
    async fn apply_verified_payment(
        &self,
        tenant_id: &str,
        reference: &str,
    ) -> Result<TopUpOutcome, LedgerError> {
        let result = self.verify_and_credit(tenant_id, reference.trim()).await;

        match &result {
            Ok(TopUpOutcome::Applied { credits, balance }) => {
                TOP_UPS_TOTAL.with_label_values(&["applied"]).inc();
                CREDITS_PURCHASED_TOTAL.inc_by(credits.as_f64());
                info!(
                    tenant_id,
                    reference,
                    credits = %credits,
                    balance = %balance,
                    "Top-up applied"
                );
            }
            Ok(TopUpOutcome::AlreadyApplied) => {
                TOP_UPS_TOTAL.with_label_values(&["duplicate"]).inc();
                info!(tenant_id, reference, "Top-up already applied");
            }
            Err(e) => {
                TOP_UPS_TOTAL.with_label_values(&["rejected"]).inc();
                warn!(tenant_id, reference, error = %e, "Top-up rejected");
            }
        }

        result
    }

    async fn verify_and_credit(
        &self,
        tenant_id: &str,
        reference: &str,
    ) -> Result<TopUpOutcome, LedgerError> {
        if reference.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Payment reference is required".to_string(),
            ));
        }

        let payment = self.gateway.verify(reference).await.map_err(|e| match e {
            GatewayError::Rejected { message, .. } => LedgerError::PaymentNotVerified(message),
            GatewayError::InvalidReference(reference) => {
                LedgerError::InvalidInput(format!("Invalid payment reference '{}'", reference))
            }
            other => LedgerError::Gateway(other.to_string()),
        })?;

        if !payment.is_successful() {
            return Err(LedgerError::PaymentNotVerified(format!(
                "gateway reported status '{}'",
                payment.status
            )));
        }
        if payment.reference != reference {
            return Err(LedgerError::PaymentNotVerified(
                "gateway returned a different reference".to_string(),
            ));
        }
        if !payment
            .currency
            .eq_ignore_ascii_case(&self.settings.operating_currency)
        {
            return Err(LedgerError::InvalidCurrency {
                expected: self.settings.operating_currency.clone(),
                actual: payment.currency,
            });
        }
        // Payments without our checkout metadata are never claimable.
        if payment.tenant_id.as_deref() != Some(tenant_id) {
            return Err(LedgerError::PaymentNotVerified(
                "payment does not belong to this account".to_string(),
            ));
        }
        let credits = Credits::from_minor_units(payment.amount)
            .filter(|c| !c.is_zero())
            .ok_or_else(|| LedgerError::PaymentNotVerified("payment amount is zero".to_string()))?;

        let top_up = TopUpTransaction::completed(reference, tenant_id, credits, &payment.currency);
        let store = &self.store;
        let record = &top_up;
        self.retrying("commit_top_up", move || store.commit_top_up(record))
            .await
    }

    /// Authenticates and applies a gateway webhook.
    ///
    /// Returns an error only for a bad signature or a failure worth the
    /// gateway redelivering; business rejections are reported as
    /// [`WebhookOutcome::Rejected`] so the event is acknowledged.
    #[instrument(skip(self, body, signature))]
    pub async fn handle_gateway_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, LedgerError> {
        let signature = signature.ok_or(LedgerError::InvalidSignature)?;
        if !self.gateway.verify_webhook_signature(body, signature) {
            return Err(LedgerError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| LedgerError::InvalidInput(format!("Malformed webhook body: {}", e)))?;
        if event.event != CHARGE_SUCCESS_EVENT {
            info!(event = %event.event, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored("unhandled event type"));
        }

        let Some(tenant_id) = event.data.tenant_id() else {
            warn!(reference = %event.data.reference, "Webhook charge carries no tenant");
            return Ok(WebhookOutcome::Ignored("no tenant in metadata"));
        };

        match self
            .confirm_top_up_for_tenant(&tenant_id, &event.data.reference)
            .await
        {
            Ok(outcome) => Ok(WebhookOutcome::Processed(outcome)),
            Err(
                e @ (LedgerError::Conflict(_) | LedgerError::Database(_) | LedgerError::Gateway(_)),
            ) => Err(e),
            Err(e) => Ok(WebhookOutcome::Rejected(e.to_string())),
        }
    }

    // ---------------------------------------------------------------------
    // Tenant accounts
    // ---------------------------------------------------------------------

    /// Creates the caller's tenant, pending approval, with the signup bonus.
    #[instrument(skip(self, registration), fields(user_id = %principal.user_id))]
    pub async fn register_tenant(
        &self,
        principal: &Principal,
        registration: RegisterTenant,
    ) -> Result<TenantAccount, LedgerError> {
        registration.validate()?;
        let owner_id = principal.tenant_id()?;

        let tenant = TenantAccount::new(owner_id, &registration, self.settings.signup_bonus);
        self.store.create_tenant(&tenant).await?;

        info!(tenant_id = %tenant.id, credits = %tenant.credits, "Tenant registered");
        self.notify(welcome_email(&tenant));
        Ok(tenant)
    }

    pub async fn account(&self, principal: &Principal) -> Result<TenantAccount, LedgerError> {
        let tenant_id = principal.tenant_id()?;
        self.store
            .tenant(tenant_id)
            .await?
            .ok_or(LedgerError::TenantNotFound)
    }

    #[instrument(skip(self), fields(admin_id = %admin.user_id))]
    pub async fn approve_tenant(
        &self,
        admin: &Principal,
        tenant_id: &str,
    ) -> Result<ApprovalOutcome, LedgerError> {
        admin.require_super_admin()?;

        let store = &self.store;
        let outcome = self
            .retrying("approve_tenant", move || store.approve_tenant(tenant_id))
            .await?;
        match &outcome {
            ApprovalOutcome::Approved(tenant) => {
                info!(tenant_id, "Tenant approved");
                self.notify(approval_email(tenant, &self.settings.login_url));
            }
            ApprovalOutcome::AlreadyApproved(_) => info!(tenant_id, "Tenant already approved"),
        }
        Ok(outcome)
    }

    pub async fn list_tenants(
        &self,
        admin: &Principal,
        filter: TenantFilter,
    ) -> Result<Vec<TenantAccount>, LedgerError> {
        admin.require_super_admin()?;
        self.store.list_tenants(filter).await
    }

    // ---------------------------------------------------------------------
    // Pricing
    // ---------------------------------------------------------------------

    pub async fn pricing(&self) -> Result<PricingConfig, LedgerError> {
        self.store
            .pricing()
            .await?
            .ok_or(LedgerError::ConfigurationMissing)
    }

    #[instrument(skip(self, update), fields(admin_id = %admin.user_id))]
    pub async fn update_pricing(
        &self,
        admin: &Principal,
        update: PricingUpdate,
    ) -> Result<PricingConfig, LedgerError> {
        admin.require_super_admin()?;
        update.validate()?;

        let pricing = update.to_config().ok_or_else(|| {
            LedgerError::InvalidInput("Prices must be finite numbers".to_string())
        })?;
        self.store.save_pricing(&pricing).await?;

        info!(
            job_card_cost = %pricing.job_card_cost,
            expense_cost = %pricing.expense_cost,
            min_top_up = %pricing.min_top_up,
            "Pricing updated"
        );
        Ok(pricing)
    }

    /// Stores the default prices unless pricing already exists.
    pub async fn seed_default_pricing(&self) -> Result<bool, LedgerError> {
        let seeded = self
            .store
            .insert_pricing_if_absent(&PricingConfig::default())
            .await?;
        if seeded {
            info!("Seeded default pricing");
        }
        Ok(seeded)
    }

    // ---------------------------------------------------------------------
    // Listings
    // ---------------------------------------------------------------------

    pub async fn list_jobs(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<(Vec<Job>, u64), LedgerError> {
        let tenant_id = principal.tenant_id()?;
        self.require_approved(tenant_id).await?;
        self.store.list_jobs(tenant_id, page).await
    }

    pub async fn list_expenses(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<(Vec<Expense>, u64), LedgerError> {
        let tenant_id = principal.tenant_id()?;
        self.require_approved(tenant_id).await?;
        self.store.list_expenses(tenant_id, page).await
    }

    pub async fn list_activities(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<(Vec<ActivityEntry>, u64), LedgerError> {
        let tenant_id = principal.tenant_id()?;
        self.require_approved(tenant_id).await?;
        self.store.list_activities(tenant_id, page).await
    }

    /// Purchase history stays visible while pending.
    pub async fn list_top_ups(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<(Vec<TopUpTransaction>, u64), LedgerError> {
        let tenant_id = principal.tenant_id()?;
        self.store.list_top_ups(tenant_id, page).await
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    async fn require_approved(&self, tenant_id: &str) -> Result<(), LedgerError> {
        match self.store.tenant(tenant_id).await? {
            Some(tenant) if tenant.approved => Ok(()),
            Some(_) => Err(LedgerError::PendingApproval),
            None => Err(LedgerError::TenantNotFound),
        }
    }

    /// Approval only ever moves from pending to approved, so reading it
    /// outside the charge transaction cannot let a pending tenant through.
    /// A missing tenant is left for the charge procedure to report.
    async fn ensure_not_pending(&self, tenant_id: &str) -> Result<(), LedgerError> {
        match self.store.tenant(tenant_id).await? {
            Some(tenant) if !tenant.approved => Err(LedgerError::PendingApproval),
            _ => Ok(()),
        }
    }

    async fn retrying<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, LedgerError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        retry_with_backoff(&self.retry, operation, || {
            let attempt = f();
            async move {
                let result = attempt.await;
                if let Err(LedgerError::Conflict(_)) = &result {
                    CONFLICT_RETRIES_TOTAL
                        .with_label_values(&[operation])
                        .inc();
                }
                result
            }
        })
        .await
    }

    fn notify(&self, email: EmailMessage) {
        if !self.notifier.is_enabled() {
            return;
        }
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&email).await {
                warn!(to = %email.to, subject = %email.subject, error = %e, "Failed to send email");
            }
        });
    }
}

fn new_reference() -> String {
    format!("cw_{}", Uuid::new_v4().simple())
}
