mod common;

use common::{new_job, TestLedger};
use credit_service::ledger::{LedgerError, LedgerStore, Principal};
use credit_service::models::{
    ActivityKind, CreditAction, Credits, ExpenseCategory, NewExpense, Page,
};

fn expense(
    category: ExpenseCategory,
    description: Option<&str>,
    member: Option<&str>,
) -> NewExpense {
    NewExpense {
        category,
        description: description.map(str::to_string),
        amount: 1500.0,
        date: None,
        team_member_name: member.map(str::to_string),
    }
}

#[tokio::test]
async fn second_job_is_rejected_once_balance_runs_low() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(2), true).await;

    let receipt = t.ledger.create_job(&owner, new_job("KCA 123A")).await.unwrap();
    assert_eq!(receipt.action, CreditAction::JobCard);
    assert_eq!(receipt.charged, Credits::from_hundredths(150));
    assert_eq!(receipt.balance, Credits::from_hundredths(50));

    let err = t
        .ledger
        .create_job(&owner, new_job("KCB 456B"))
        .await
        .unwrap_err();
    match err {
        LedgerError::InsufficientCredits {
            action,
            required,
            available,
        } => {
            assert_eq!(action, CreditAction::JobCard);
            assert_eq!(required, Credits::from_hundredths(150));
            assert_eq!(available, Credits::from_hundredths(50));
        }
        other => panic!("expected InsufficientCredits, got {:?}", other),
    }

    assert_eq!(t.balance("owner-a").await, Credits::from_hundredths(50));
    assert_eq!(t.job_count("owner-a").await, 1);
}

#[tokio::test]
async fn failed_charge_leaves_no_record_and_no_balance_change() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_hundredths(100), true).await;

    let err = t.ledger.create_job(&owner, new_job("KCA 123A")).await;
    assert!(matches!(err, Err(LedgerError::InsufficientCredits { .. })));

    assert_eq!(t.balance("owner-a").await, Credits::from_hundredths(100));
    assert_eq!(t.job_count("owner-a").await, 0);

    let (activities, _) = t
        .store
        .list_activities("owner-a", Page::default())
        .await
        .unwrap();
    assert!(activities.is_empty());
}

#[tokio::test]
async fn concurrent_jobs_never_overdraw() {
    let t = TestLedger::new().await;
    // Room for exactly three job cards at 1.5 each.
    let owner = t.seed_tenant("owner-a", Credits::from_hundredths(500), true).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = t.ledger.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .create_job(&owner, new_job(&format!("KDA {:03}X", i)))
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientCredits { .. }) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(t.balance("owner-a").await, Credits::from_hundredths(50));
    assert_eq!(t.job_count("owner-a").await, 3);
}

#[tokio::test]
async fn racing_jobs_for_exactly_one_cost_let_one_through() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_hundredths(150), true).await;

    let (first, second) = tokio::join!(
        t.ledger.create_job(&owner, new_job("KCA 001A")),
        t.ledger.create_job(&owner, new_job("KCA 002A")),
    );

    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert!(t.balance("owner-a").await.is_zero());
}

#[tokio::test]
async fn charge_uses_price_at_commit_time() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(10), true).await;

    t.set_pricing(2.0, 0.5, 50.0).await;

    let receipt = t.ledger.create_job(&owner, new_job("KCA 123A")).await.unwrap();
    assert_eq!(receipt.charged, Credits::from_whole(2));
    assert_eq!(t.balance("owner-a").await, Credits::from_whole(8));

    let (jobs, _) = t.store.list_jobs("owner-a", Page::default()).await.unwrap();
    assert_eq!(jobs[0].charged, Credits::from_whole(2));
}

#[tokio::test]
async fn job_writes_record_client_vehicle_and_activity() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(10), true).await;

    let receipt = t.ledger.create_job(&owner, new_job("kca 123a")).await.unwrap();

    let (jobs, total) = t.ledger.list_jobs(&owner, Page::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(jobs[0].id, receipt.record_id);
    assert_eq!(jobs[0].registration_plate, "KCA123A");
    assert!(!jobs[0].client_id.is_empty());
    assert!(!jobs[0].vehicle_id.is_empty());

    let (activities, _) = t
        .ledger
        .list_activities(&owner, Page::default())
        .await
        .unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].kind, ActivityKind::Job);
    assert_eq!(activities[0].status, "Pending");
}

#[tokio::test]
async fn repeat_customer_reuses_client_and_vehicle() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(10), true).await;

    t.ledger.create_job(&owner, new_job("KCA 123A")).await.unwrap();
    t.ledger.create_job(&owner, new_job("KCA 123A")).await.unwrap();

    let (jobs, _) = t.ledger.list_jobs(&owner, Page::default()).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].client_id, jobs[1].client_id);
    assert_eq!(jobs[0].vehicle_id, jobs[1].vehicle_id);
}

#[tokio::test]
async fn expense_is_charged_at_expense_cost() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(1), true).await;

    let receipt = t
        .ledger
        .record_expense(&owner, expense(ExpenseCategory::Rent, Some("March rent"), None))
        .await
        .unwrap();
    assert_eq!(receipt.action, CreditAction::Expense);
    assert_eq!(receipt.charged, Credits::from_hundredths(50));
    assert_eq!(receipt.balance, Credits::from_hundredths(50));

    let (expenses, _) = t.ledger.list_expenses(&owner, Page::default()).await.unwrap();
    assert_eq!(expenses[0].description, "March rent");
}

#[tokio::test]
async fn salary_expense_requires_team_member() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(5), true).await;

    let err = t
        .ledger
        .record_expense(&owner, expense(ExpenseCategory::Salary, None, None))
        .await;
    assert!(matches!(err, Err(LedgerError::InvalidInput(_))));
    assert_eq!(t.balance("owner-a").await, Credits::from_whole(5));

    t.ledger
        .record_expense(&owner, expense(ExpenseCategory::Salary, None, Some("Otieno")))
        .await
        .unwrap();
    let (expenses, _) = t.ledger.list_expenses(&owner, Page::default()).await.unwrap();
    assert_eq!(expenses[0].description, "Salary for Otieno");
}

#[tokio::test]
async fn expense_without_description_is_rejected_before_charging() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(5), true).await;

    let err = t
        .ledger
        .record_expense(&owner, expense(ExpenseCategory::Supplies, Some("  "), None))
        .await;
    assert!(matches!(err, Err(LedgerError::InvalidInput(_))));
    assert_eq!(t.expense_count("owner-a").await, 0);
}

#[tokio::test]
async fn missing_pricing_fails_before_tenant_lookup() {
    let t = TestLedger::unpriced();
    let owner = Principal::owner("nobody");

    let err = t.ledger.create_job(&owner, new_job("KCA 123A")).await;
    assert!(matches!(err, Err(LedgerError::ConfigurationMissing)));
}

#[tokio::test]
async fn unknown_tenant_is_reported() {
    let t = TestLedger::new().await;
    let owner = Principal::owner("ghost");

    let err = t.ledger.create_job(&owner, new_job("KCA 123A")).await;
    assert!(matches!(err, Err(LedgerError::TenantNotFound)));
}

#[tokio::test]
async fn pending_tenant_cannot_charge_or_list() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(200), false).await;

    let err = t.ledger.create_job(&owner, new_job("KCA 123A")).await;
    assert!(matches!(err, Err(LedgerError::PendingApproval)));

    let err = t
        .ledger
        .record_expense(&owner, expense(ExpenseCategory::Rent, Some("rent"), None))
        .await;
    assert!(matches!(err, Err(LedgerError::PendingApproval)));

    assert!(matches!(
        t.ledger.list_jobs(&owner, Page::default()).await,
        Err(LedgerError::PendingApproval)
    ));
    assert!(matches!(
        t.ledger.list_expenses(&owner, Page::default()).await,
        Err(LedgerError::PendingApproval)
    ));
    assert!(matches!(
        t.ledger.list_activities(&owner, Page::default()).await,
        Err(LedgerError::PendingApproval)
    ));

    // The account itself stays readable.
    assert_eq!(t.balance("owner-a").await, Credits::from_whole(200));
    assert_eq!(t.job_count("owner-a").await, 0);
}

#[tokio::test]
async fn super_admin_has_no_tenant_to_charge() {
    let t = TestLedger::new().await;

    let err = t.ledger.create_job(&t.admin(), new_job("KCA 123A")).await;
    assert!(matches!(err, Err(LedgerError::Forbidden(_))));
}

#[tokio::test]
async fn invalid_job_is_rejected_without_charge() {
    let t = TestLedger::new().await;
    let owner = t.seed_tenant("owner-a", Credits::from_whole(5), true).await;

    let mut job = new_job("KCA 123A");
    job.service = String::new();

    let err = t.ledger.create_job(&owner, job).await;
    assert!(matches!(err, Err(LedgerError::Validation(_))));
    assert_eq!(t.balance("owner-a").await, Credits::from_whole(5));
}

#[tokio::test]
async fn tenants_are_isolated() {
    let t = TestLedger::new().await;
    let a = t.seed_tenant("owner-a", Credits::from_whole(5), true).await;
    let b = t.seed_tenant("owner-b", Credits::from_whole(5), true).await;

    t.ledger.create_job(&a, new_job("KCA 123A")).await.unwrap();

    let (jobs, total) = t.ledger.list_jobs(&b, Page::default()).await.unwrap();
    assert!(jobs.is_empty());
    assert_eq!(total, 0);
    assert_eq!(t.balance("owner-b").await, Credits::from_whole(5));
}
