pub mod memory_store;
pub mod metrics;
pub mod mongo_store;
pub mod notifier;
pub mod paystack;

pub use memory_store::InMemoryLedgerStore;
pub use metrics::{get_metrics, init_metrics};
pub use mongo_store::MongoLedgerStore;
pub use notifier::{MockNotifier, Notifier, SmtpNotifier};
pub use paystack::{PaymentGateway, PaystackClient};
