//! Runs against a real MongoDB replica set (transactions need one):
//! `TEST_MONGODB_URI=mongodb://localhost:27017/?replicaSet=rs0 cargo test -- --ignored`

mod common;

use common::new_job;
use credit_service::ledger::{
    ApprovalOutcome, LedgerError, LedgerStore, PendingCharge, TopUpOutcome,
};
use credit_service::models::{
    ActivityKind, Credits, JobDraft, Page, PricingConfig, RegisterTenant, TenantAccount,
    TopUpTransaction,
};
use credit_service::services::MongoLedgerStore;

struct TestDb {
    store: MongoLedgerStore,
    client: mongodb::Client,
    name: String,
}

impl TestDb {
    async fn spawn() -> Self {
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
        let name = format!("credit_test_{}", uuid::Uuid::new_v4().simple());

        let store = MongoLedgerStore::connect(&uri, &name)
            .await
            .expect("Failed to connect to MongoDB");
        store
            .initialize_indexes()
            .await
            .expect("Failed to create indexes");
        store
            .save_pricing(&PricingConfig::default())
            .await
            .expect("Failed to save pricing");

        let client = mongodb::Client::with_uri_str(&uri).await.unwrap();
        Self {
            store,
            client,
            name,
        }
    }

    async fn seed_tenant(&self, owner_id: &str, credits: Credits) {
        self.seed(owner_id, credits, true).await;
    }

    async fn seed(&self, owner_id: &str, credits: Credits, approved: bool) {
        let mut tenant = TenantAccount::new(
            owner_id,
            &RegisterTenant {
                name: "Sparkle Wash".to_string(),
                email: "owner@example.com".to_string(),
            },
            credits,
        );
        tenant.approved = approved;
        self.store.create_tenant(&tenant).await.unwrap();
    }

    async fn balance(&self, owner_id: &str) -> Credits {
        self.store.tenant(owner_id).await.unwrap().unwrap().credits
    }

    async fn cleanup(self) {
        self.client.database(&self.name).drop(None).await.ok();
    }
}

#[tokio::test]
#[ignore = "requires a MongoDB replica set"]
async fn charge_commits_record_and_decrement_together() {
    let db = TestDb::spawn().await;
    db.seed_tenant("owner-a", Credits::from_whole(2)).await;

    let charge = PendingCharge::job(JobDraft::new("owner-a", new_job("KCA 123A")));
    let receipt = db.store.commit_charge(&charge).await.unwrap();
    assert_eq!(receipt.balance, Credits::from_hundredths(50));

    let second = PendingCharge::job(JobDraft::new("owner-a", new_job("KCA 123A")));
    let err = db.store.commit_charge(&second).await;
    assert!(matches!(err, Err(LedgerError::InsufficientCredits { .. })));

    let (jobs, total) = db.store.list_jobs("owner-a", Page::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(jobs[0].id, receipt.record_id);
    assert_eq!(db.balance("owner-a").await, Credits::from_hundredths(50));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a MongoDB replica set"]
async fn concurrent_charges_never_overdraw() {
    let db = TestDb::spawn().await;
    db.seed_tenant("owner-a", Credits::from_hundredths(450)).await;

    let mut handles = Vec::new();
    for i in 0..6 {
        let store = db.store.clone();
        handles.push(tokio::spawn(async move {
            let charge = PendingCharge::job(JobDraft::new(
                "owner-a",
                new_job(&format!("KDA {:03}X", i)),
            ));
            store.commit_charge(&charge).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        // Conflicts are acceptable here; retrying is the service's job.
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert!(succeeded <= 3);
    let balance = db.balance("owner-a").await;
    assert!(balance >= Credits::ZERO);
    assert_eq!(
        balance,
        Credits::from_hundredths(450 - 150 * succeeded as i64)
    );

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a MongoDB replica set"]
async fn top_up_reference_is_applied_once() {
    let db = TestDb::spawn().await;
    db.seed_tenant("owner-a", Credits::ZERO).await;

    let top_up = TopUpTransaction::completed("ref-001", "owner-a", Credits::from_whole(5), "KES");
    let first = db.store.commit_top_up(&top_up).await.unwrap();
    assert!(matches!(first, TopUpOutcome::Applied { .. }));

    let second = db.store.commit_top_up(&top_up).await.unwrap();
    assert_eq!(second, TopUpOutcome::AlreadyApplied);
    assert_eq!(db.balance("owner-a").await, Credits::from_whole(5));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a MongoDB replica set"]
async fn pricing_seed_does_not_overwrite() {
    let db = TestDb::spawn().await;

    let custom = PricingConfig::new(
        Credits::from_whole(3),
        Credits::from_whole(1),
        Credits::from_whole(100),
    );
    db.store.save_pricing(&custom).await.unwrap();

    let inserted = db
        .store
        .insert_pricing_if_absent(&PricingConfig::default())
        .await
        .unwrap();
    assert!(!inserted);
    assert_eq!(
        db.store.pricing().await.unwrap().unwrap().job_card_cost,
        Credits::from_whole(3)
    );

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a MongoDB replica set"]
async fn approval_and_its_activity_commit_together() {
    let db = TestDb::spawn().await;
    db.seed("owner-a", Credits::from_whole(200), false).await;

    let first = db.store.approve_tenant("owner-a").await.unwrap();
    assert!(matches!(first, ApprovalOutcome::Approved(ref t) if t.approved));

    let second = db.store.approve_tenant("owner-a").await.unwrap();
    assert!(matches!(second, ApprovalOutcome::AlreadyApproved(_)));

    let (activities, total) = db
        .store
        .list_activities("owner-a", Page::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(activities[0].kind, ActivityKind::Admin);

    let missing = db.store.approve_tenant("nobody").await;
    assert!(matches!(missing, Err(LedgerError::TenantNotFound)));

    db.cleanup().await;
}
