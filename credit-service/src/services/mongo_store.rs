//! MongoDB ledger store.
//!
//! Each procedure runs inside one multi-document transaction (snapshot reads,
//! majority writes), so it needs a replica set. Concurrent transactions that
//! touch the same tenant document abort with a write conflict, which surfaces
//! as [`LedgerError::Conflict`].

use crate::ledger::error::is_duplicate_key;
use crate::ledger::{
    ApprovalOutcome, ChargeReceipt, ChargeRecord, LedgerError, LedgerStore, PendingCharge,
    TopUpOutcome,
};
use crate::models::{
    ActivityEntry, Client, Credits, Expense, ExpenseDraft, Job, JobDraft, Page, PricingConfig,
    TenantAccount, TenantFilter, TopUpTransaction, Vehicle, GLOBAL_PRICING_ID,
};
use crate::services::metrics::STORE_OPERATION_DURATION;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime, Document},
    error::UNKNOWN_TRANSACTION_COMMIT_RESULT,
    options::{
        Acknowledgment, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReadConcern,
        ReplaceOptions, ReturnDocument, TransactionOptions, WriteConcern,
    },
    Client as MongoClient, ClientSession, Collection, Database, IndexModel,
};
use serde::de::DeserializeOwned;
use tracing::instrument;

const COMMIT_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct MongoLedgerStore {
    client: MongoClient,
    db: Database,
}

impl MongoLedgerStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, LedgerError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to MongoDB");
            LedgerError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    fn tenants(&self) -> Collection<TenantAccount> {
        self.db.collection("carwashes")
    }

    fn settings(&self) -> Collection<PricingConfig> {
        self.db.collection("settings")
    }

    fn jobs(&self) -> Collection<Job> {
        self.db.collection("jobs")
    }

    fn clients(&self) -> Collection<Client> {
        self.db.collection("clients")
    }

    fn vehicles(&self) -> Collection<Vehicle> {
        self.db.collection("vehicles")
    }

    fn expenses(&self) -> Collection<Expense> {
        self.db.collection("expenses")
    }

    fn top_ups(&self) -> Collection<TopUpTransaction> {
        self.db.collection("transactions")
    }

    fn activities(&self) -> Collection<ActivityEntry> {
        self.db.collection("activities")
    }

    pub async fn initialize_indexes(&self) -> Result<(), LedgerError> {
        tracing::info!("Creating MongoDB indexes for credit-service");

        let newest_first = |name: &str| {
            IndexModel::builder()
                .keys(doc! { "tenant_id": 1, "created_at": -1 })
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build()
        };

        self.jobs()
            .create_index(newest_first("tenant_created_idx"), None)
            .await?;
        self.activities()
            .create_index(newest_first("tenant_created_idx"), None)
            .await?;
        self.top_ups()
            .create_index(newest_first("tenant_created_idx"), None)
            .await?;
        self.expenses()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "tenant_id": 1, "date": -1 })
                    .options(IndexOptions::builder().name("tenant_date_idx".to_string()).build())
                    .build(),
                None,
            )
            .await?;

        // Upserts inside the job transaction rely on these being unique.
        self.clients()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "tenant_id": 1, "phone_number": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("tenant_phone_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        self.vehicles()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "tenant_id": 1, "client_id": 1, "registration_plate": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("tenant_client_plate_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;
        self.tenants()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "approved": 1 })
                    .options(IndexOptions::builder().name("approved_idx".to_string()).build())
                    .build(),
                None,
            )
            .await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    async fn begin(&self) -> Result<ClientSession, LedgerError> {
        let mut session = self.client.start_session(None).await?;
        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build();
        session.start_transaction(options).await?;
        Ok(session)
    }

    /// Commits on success, aborts on failure. A commit whose outcome is
    /// unknown is retried as a commit, never by re-running the procedure.
    async fn finish<T>(
        &self,
        mut session: ClientSession,
        result: Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                abort(&mut session).await;
                return Err(err);
            }
        };

        let mut attempt = 1;
        loop {
            match session.commit_transaction().await {
                Ok(()) => return Ok(value),
                Err(e)
                    if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && attempt < COMMIT_ATTEMPTS =>
                {
                    tracing::warn!(attempt, error = %e, "Commit result unknown, retrying commit");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn charge_in_session(
        &self,
        session: &mut ClientSession,
        charge: &PendingCharge,
    ) -> Result<ChargeReceipt, LedgerError> {
        let action = charge.action();

        let pricing = self
            .settings()
            .find_one_with_session(doc! { "_id": GLOBAL_PRICING_ID }, None, session)
            .await?
            .ok_or(LedgerError::ConfigurationMissing)?;
        let tenant = self
            .tenants()
            .find_one_with_session(doc! { "_id": &charge.tenant_id }, None, session)
            .await?
            .ok_or(LedgerError::TenantNotFound)?;

        let cost = pricing.cost_of(action);
        let insufficient = |available: Credits| LedgerError::InsufficientCredits {
            action,
            required: cost,
            available,
        };
        let balance = tenant
            .credits
            .checked_sub(cost)
            .filter(|b| *b >= Credits::ZERO)
            .ok_or_else(|| insufficient(tenant.credits))?;

        // The filter re-asserts the balance check at write time.
        let decremented = self
            .tenants()
            .update_one_with_session(
                doc! { "_id": &charge.tenant_id, "credits": { "$gte": cost.hundredths() } },
                doc! {
                    "$inc": { "credits": -cost.hundredths() },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
                session,
            )
            .await?;
        if decremented.matched_count == 0 {
            return Err(insufficient(tenant.credits));
        }

        let activity = match &charge.record {
            ChargeRecord::Job(draft) => {
                let job = self.insert_job(session, draft.clone(), cost).await?;
                ActivityEntry::job_created(&job)
            }
            ChargeRecord::Expense(draft) => {
                let expense = self.insert_expense(session, draft.clone(), cost).await?;
                ActivityEntry::expense_recorded(&expense)
            }
        };
        self.activities()
            .insert_one_with_session(&activity, None, session)
            .await?;

        Ok(ChargeReceipt {
            record_id: charge.record_id().to_string(),
            action,
            charged: cost,
            balance,
        })
    }

    async fn insert_job(
        &self,
        session: &mut ClientSession,
        draft: JobDraft,
        charged: Credits,
    ) -> Result<Job, LedgerError> {
        let client_id = self.upsert_client(session, &draft).await?;
        let vehicle_id = self.upsert_vehicle(session, &draft, &client_id).await?;
        let job = draft.into_job(client_id, vehicle_id, charged);
        self.jobs().insert_one_with_session(&job, None, session).await?;
        Ok(job)
    }

    async fn insert_expense(
        &self,
        session: &mut ClientSession,
        draft: ExpenseDraft,
        charged: Credits,
    ) -> Result<Expense, LedgerError> {
        let expense = draft.into_expense(charged);
        self.expenses()
            .insert_one_with_session(&expense, None, session)
            .await?;
        Ok(expense)
    }

    async fn upsert_client(
        &self,
        session: &mut ClientSession,
        draft: &JobDraft,
    ) -> Result<String, LedgerError> {
        let existing = self
            .clients()
            .find_one_with_session(
                doc! { "tenant_id": &draft.tenant_id, "phone_number": &draft.client.phone_number },
                None,
                session,
            )
            .await?;

        let Some(existing) = existing else {
            let client = draft.new_client();
            self.clients()
                .insert_one_with_session(&client, None, session)
                .await?;
            return Ok(client.id);
        };

        let mut set = doc! { "name": &draft.client.name, "updated_at": DateTime::now() };
        if let Some(email) = &draft.client.email {
            set.insert("email", email);
        }
        self.clients()
            .update_one_with_session(
                doc! { "_id": &existing.id },
                doc! { "$set": set },
                None,
                session,
            )
            .await?;
        Ok(existing.id)
    }

    async fn upsert_vehicle(
        &self,
        session: &mut ClientSession,
        draft: &JobDraft,
        client_id: &str,
    ) -> Result<String, LedgerError> {
        let existing = self
            .vehicles()
            .find_one_with_session(
                doc! {
                    "tenant_id": &draft.tenant_id,
                    "client_id": client_id,
                    "registration_plate": &draft.vehicle.registration_plate,
                },
                None,
                session,
            )
            .await?;

        match existing {
            Some(vehicle) => Ok(vehicle.id),
            None => {
                let vehicle = draft.new_vehicle(client_id);
                self.vehicles()
                    .insert_one_with_session(&vehicle, None, session)
                    .await?;
                Ok(vehicle.id)
            }
        }
    }

    /// Flips `approved` and appends the activity entry together, so an
    /// approval is never visible without its audit record.
    async fn approve_in_session(
        &self,
        session: &mut ClientSession,
        tenant_id: &str,
    ) -> Result<ApprovalOutcome, LedgerError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let approved = self
            .tenants()
            .find_one_and_update_with_session(
                doc! { "_id": tenant_id, "approved": false },
                doc! { "$set": { "approved": true, "updated_at": DateTime::now() } },
                options,
                session,
            )
            .await?;

        match approved {
            Some(tenant) => {
                let entry = ActivityEntry::tenant_approved(tenant_id);
                self.activities()
                    .insert_one_with_session(&entry, None, session)
                    .await?;
                Ok(ApprovalOutcome::Approved(tenant))
            }
            None => self
                .tenants()
                .find_one_with_session(doc! { "_id": tenant_id }, None, session)
                .await?
                .map(ApprovalOutcome::AlreadyApproved)
                .ok_or(LedgerError::TenantNotFound),
        }
    }

    async fn top_up_in_session(
        &self,
        session: &mut ClientSession,
        top_up: &TopUpTransaction,
    ) -> Result<TopUpOutcome, LedgerError> {
        let seen = self
            .top_ups()
            .find_one_with_session(doc! { "_id": &top_up.reference }, None, session)
            .await?;
        if seen.is_some() {
            return Ok(TopUpOutcome::AlreadyApplied);
        }

        let tenant = self
            .tenants()
            .find_one_with_session(doc! { "_id": &top_up.tenant_id }, None, session)
            .await?
            .ok_or(LedgerError::TenantNotFound)?;
        let balance = tenant
            .credits
            .checked_add(top_up.credits)
            .ok_or_else(|| LedgerError::InvalidInput("balance overflow".to_string()))?;

        self.top_ups()
            .insert_one_with_session(top_up, None, session)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    LedgerError::AlreadyExists("Top-up reference")
                } else {
                    LedgerError::from(e)
                }
            })?;

        self.tenants()
            .update_one_with_session(
                doc! { "_id": &top_up.tenant_id },
                doc! {
                    "$inc": { "credits": top_up.credits.hundredths() },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
                session,
            )
            .await?;

        let activity =
            ActivityEntry::credits_purchased(&top_up.tenant_id, top_up.credits, &top_up.reference);
        self.activities()
            .insert_one_with_session(&activity, None, session)
            .await?;

        Ok(TopUpOutcome::Applied {
            credits: top_up.credits,
            balance,
        })
    }

    async fn page<T>(
        &self,
        collection: Collection<T>,
        tenant_id: &str,
        sort: Document,
        page: Page,
    ) -> Result<(Vec<T>, u64), LedgerError>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let filter = doc! { "tenant_id": tenant_id };
        let options = FindOptions::builder()
            .sort(sort)
            .skip(page.offset)
            .limit(page.limit)
            .build();

        let items: Vec<T> = collection
            .find(filter.clone(), options)
            .await?
            .try_collect()
            .await?;
        let total = collection.count_documents(filter, None).await?;

        Ok((items, total))
    }
}

async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        tracing::debug!(error = %e, "Abort after failed procedure did not complete");
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    #[instrument(
        skip(self, charge),
        fields(tenant_id = %charge.tenant_id, action = charge.action().as_str())
    )]
    async fn commit_charge(&self, charge: &PendingCharge) -> Result<ChargeReceipt, LedgerError> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&["commit_charge"])
            .start_timer();

        let mut session = self.begin().await?;
        let result = self.charge_in_session(&mut session, charge).await;
        self.finish(session, result).await
    }

    #[instrument(
        skip(self, top_up),
        fields(tenant_id = %top_up.tenant_id, reference = %top_up.reference)
    )]
    async fn commit_top_up(&self, top_up: &TopUpTransaction) -> Result<TopUpOutcome, LedgerError> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&["commit_top_up"])
            .start_timer();

        let mut session = self.begin().await?;
        match self.top_up_in_session(&mut session, top_up).await {
            // A concurrent confirmation inserted the reference first.
            Err(LedgerError::AlreadyExists(_)) => {
                abort(&mut session).await;
                Ok(TopUpOutcome::AlreadyApplied)
            }
            result => self.finish(session, result).await,
        }
    }

    async fn tenant(&self, tenant_id: &str) -> Result<Option<TenantAccount>, LedgerError> {
        Ok(self.tenants().find_one(doc! { "_id": tenant_id }, None).await?)
    }

    async fn create_tenant(&self, tenant: &TenantAccount) -> Result<(), LedgerError> {
        self.tenants().insert_one(tenant, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                LedgerError::AlreadyExists("Carwash account")
            } else {
                LedgerError::from(e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn approve_tenant(&self, tenant_id: &str) -> Result<ApprovalOutcome, LedgerError> {
        let _timer = STORE_OPERATION_DURATION
            .with_label_values(&["approve_tenant"])
            .start_timer();

        let mut session = self.begin().await?;
        let result = self.approve_in_session(&mut session, tenant_id).await;
        self.finish(session, result).await
    }

    async fn list_tenants(&self, filter: TenantFilter) -> Result<Vec<TenantAccount>, LedgerError> {
        let query = match filter {
            TenantFilter::All => doc! {},
            TenantFilter::Pending => doc! { "approved": false },
            TenantFilter::Approved => doc! { "approved": true },
        };
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        Ok(self.tenants().find(query, options).await?.try_collect().await?)
    }

    async fn pricing(&self) -> Result<Option<PricingConfig>, LedgerError> {
        Ok(self
            .settings()
            .find_one(doc! { "_id": GLOBAL_PRICING_ID }, None)
            .await?)
    }

    async fn save_pricing(&self, pricing: &PricingConfig) -> Result<(), LedgerError> {
        self.settings()
            .replace_one(
                doc! { "_id": GLOBAL_PRICING_ID },
                pricing,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn insert_pricing_if_absent(
        &self,
        pricing: &PricingConfig,
    ) -> Result<bool, LedgerError> {
        match self.settings().insert_one(pricing, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_jobs(&self, tenant_id: &str, page: Page) -> Result<(Vec<Job>, u64), LedgerError> {
        self.page(self.jobs(), tenant_id, doc! { "created_at": -1 }, page)
            .await
    }

    async fn list_expenses(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<Expense>, u64), LedgerError> {
        self.page(self.expenses(), tenant_id, doc! { "date": -1 }, page)
            .await
    }

    async fn list_activities(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<ActivityEntry>, u64), LedgerError> {
        self.page(self.activities(), tenant_id, doc! { "created_at": -1 }, page)
            .await
    }

    async fn list_top_ups(
        &self,
        tenant_id: &str,
        page: Page,
    ) -> Result<(Vec<TopUpTransaction>, u64), LedgerError> {
        self.page(self.top_ups(), tenant_id, doc! { "created_at": -1 }, page)
            .await
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}
