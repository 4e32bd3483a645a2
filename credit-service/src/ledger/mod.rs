//! The credit ledger: every balance mutation in the service goes through the
//! procedures defined here.
//!
//! - [`LedgerStore`] is the persistence seam. Each method is one atomic
//!   read-validate-write unit against the backing database.
//! - [`LedgerService`] layers the approval gate, role checks, payment
//!   verification and conflict retries on top of a store.

pub mod access;
pub mod error;
pub mod service;
pub mod store;

pub use access::{Principal, Role};
pub use error::LedgerError;
pub use service::{Checkout, LedgerService, LedgerSettings, WebhookOutcome};
pub use store::{
    ApprovalOutcome, ChargeReceipt, ChargeRecord, LedgerStore, PendingCharge, TopUpOutcome,
};
