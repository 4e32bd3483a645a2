#![allow(dead_code)]

use async_trait::async_trait;
use credit_service::ledger::{LedgerService, LedgerSettings, Principal};
use credit_service::models::{
    ClientDetails, Credits, NewJob, Page, PricingUpdate, RegisterTenant, TenantAccount,
    VehicleDetails,
};
use credit_service::services::paystack::{
    CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, VerifiedPayment,
};
use credit_service::services::{InMemoryLedgerStore, MockNotifier};
use service_core::retry::RetryConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_ID: &str = "admin-1";
pub const VALID_SIGNATURE: &str = "valid-signature";

/// Gateway double whose verification results are set per reference.
#[derive(Default)]
pub struct StubGateway {
    payments: Mutex<HashMap<String, VerifiedPayment>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
    verify_calls: AtomicU64,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful payment for `tenant_id` in `currency`.
    pub fn settle(&self, reference: &str, tenant_id: &str, amount_minor: u64, currency: &str) {
        self.set_payment(VerifiedPayment {
            reference: reference.to_string(),
            status: "success".to_string(),
            amount: amount_minor,
            currency: currency.to_string(),
            tenant_id: Some(tenant_id.to_string()),
        });
    }

    pub fn set_payment(&self, payment: VerifiedPayment) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.reference.clone(), payment);
    }

    pub fn verify_calls(&self) -> u64 {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        self.checkouts.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            authorization_url: format!("https://checkout.test/{}", request.reference),
            access_code: format!("access-{}", request.reference),
            reference: request.reference.clone(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status: 400,
                message: "Transaction reference not found".to_string(),
            })
    }

    fn verify_webhook_signature(&self, _body: &[u8], signature: &str) -> bool {
        signature == VALID_SIGNATURE
    }
}

/// A ledger over the in-memory store with pricing 1.5 / 0.5 / min 50.
pub struct TestLedger {
    pub ledger: LedgerService,
    pub store: InMemoryLedgerStore,
    pub gateway: Arc<StubGateway>,
    pub notifier: Arc<MockNotifier>,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with_notifier(MockNotifier::new()).await
    }

    pub async fn with_notifier(notifier: MockNotifier) -> Self {
        let ledger = Self::unpriced_with(notifier);
        ledger
            .set_pricing(1.5, 0.5, 50.0)
            .await;
        ledger
    }

    /// A ledger whose pricing document was never created.
    pub fn unpriced() -> Self {
        Self::unpriced_with(MockNotifier::new())
    }

    fn unpriced_with(notifier: MockNotifier) -> Self {
        let store = InMemoryLedgerStore::new();
        let gateway = Arc::new(StubGateway::new());
        let notifier = Arc::new(notifier);

        let ledger = LedgerService::new(
            Arc::new(store.clone()),
            gateway.clone(),
            notifier.clone(),
            LedgerSettings::default(),
            RetryConfig::quick(),
        );

        Self {
            ledger,
            store,
            gateway,
            notifier,
        }
    }

    pub fn admin(&self) -> Principal {
        Principal::super_admin(ADMIN_ID)
    }

    pub async fn set_pricing(&self, job_card_cost: f64, expense_cost: f64, min_top_up: f64) {
        self.ledger
            .update_pricing(
                &self.admin(),
                PricingUpdate {
                    job_card_cost,
                    expense_cost,
                    min_top_up,
                },
            )
            .await
            .expect("Failed to set pricing");
    }

    /// Inserts a tenant with an exact balance, bypassing registration.
    pub async fn seed_tenant(&self, owner_id: &str, credits: Credits, approved: bool) -> Principal {
        use credit_service::ledger::LedgerStore;

        let mut tenant = TenantAccount::new(
            owner_id,
            &RegisterTenant {
                name: format!("{} Carwash", owner_id),
                email: format!("{}@example.com", owner_id),
            },
            credits,
        );
        tenant.approved = approved;
        self.store
            .create_tenant(&tenant)
            .await
            .expect("Failed to seed tenant");

        Principal::owner(owner_id)
    }

    pub async fn balance(&self, owner_id: &str) -> Credits {
        self.ledger
            .account(&Principal::owner(owner_id))
            .await
            .expect("Failed to read account")
            .credits
    }

    pub async fn job_count(&self, owner_id: &str) -> u64 {
        use credit_service::ledger::LedgerStore;

        let (_, total) = self
            .store
            .list_jobs(owner_id, Page::default())
            .await
            .expect("Failed to list jobs");
        total
    }

    pub async fn expense_count(&self, owner_id: &str) -> u64 {
        use credit_service::ledger::LedgerStore;

        let (_, total) = self
            .store
            .list_expenses(owner_id, Page::default())
            .await
            .expect("Failed to list expenses");
        total
    }

    /// Polls until the notifier has recorded `count` sends.
    pub async fn wait_for_emails(&self, count: u64) -> bool {
        for _ in 0..50 {
            if self.notifier.send_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub fn new_job(plate: &str) -> NewJob {
    NewJob {
        client: ClientDetails {
            name: "Jane Wanjiru".to_string(),
            phone_number: "0712345678".to_string(),
            email: None,
        },
        vehicle: VehicleDetails {
            registration_plate: plate.to_string(),
            make: "Toyota".to_string(),
            model: "Axio".to_string(),
            color: Some("Silver".to_string()),
            vehicle_type: None,
        },
        service: "Full Wash".to_string(),
        price: 800.0,
        duration_minutes: 45,
    }
}
