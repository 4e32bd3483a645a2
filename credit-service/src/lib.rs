//! credit-service: prepaid credit ledger for multi-tenant carwash accounts.
//!
//! Tenants buy credits through Paystack and spend them on job cards and
//! expense records. Every charge is an atomic check-and-decrement that also
//! writes the record it pays for.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::{router, AppState, Application};
