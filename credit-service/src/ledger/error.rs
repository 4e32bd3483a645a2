use crate::models::{CreditAction, Credits};
use mongodb::error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR};
use service_core::error::AppError;
use service_core::retry::Retryable;
use thiserror::Error;

/// MongoDB server code for a write conflict between concurrent transactions.
const WRITE_CONFLICT: i32 = 112;
/// MongoDB server code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("global pricing is not configured")]
    ConfigurationMissing,

    #[error("tenant account not found")]
    TenantNotFound,

    #[error("insufficient credits to {}: need {required}, have {available}", .action.purpose())]
    InsufficientCredits {
        action: CreditAction,
        required: Credits,
        available: Credits,
    },

    #[error("payment not verified: {0}")]
    PaymentNotVerified(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("payment currency {actual} does not match {expected}")]
    InvalidCurrency { expected: String, actual: String },

    #[error("top-up is below the minimum of {minimum} credits")]
    BelowMinimumTopUp { minimum: Credits },

    #[error("tenant account is pending approval")]
    PendingApproval,

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(anyhow::Error),
}

impl Retryable for LedgerError {
    fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

impl From<mongodb::error::Error> for LedgerError {
    fn from(err: mongodb::error::Error) -> Self {
        if err.contains_label(TRANSIENT_TRANSACTION_ERROR)
            || error_code(&err) == Some(WRITE_CONFLICT)
        {
            LedgerError::Conflict(err.to_string())
        } else {
            LedgerError::Database(anyhow::Error::new(err))
        }
    }
}

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    error_code(err) == Some(DUPLICATE_KEY)
}

fn error_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => Some(e.code),
        ErrorKind::Command(e) => Some(e.code),
        _ => None,
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::ConfigurationMissing => AppError::ConfigError(anyhow::anyhow!(
                "Global settings not found. Please contact support."
            )),
            LedgerError::TenantNotFound => {
                AppError::NotFound(anyhow::anyhow!("Carwash account not found"))
            }
            LedgerError::InsufficientCredits {
                action, required, ..
            } => AppError::PaymentRequired(anyhow::anyhow!(
                "Insufficient credits. You need {} credits to {}.",
                required,
                action.purpose()
            )),
            LedgerError::PaymentNotVerified(reason) => {
                tracing::warn!(reason = %reason, "Payment verification failed");
                AppError::BadGateway(
                    "Payment could not be verified. Please contact support.".to_string(),
                )
            }
            LedgerError::Gateway(reason) => {
                tracing::error!(reason = %reason, "Payment gateway call failed");
                AppError::BadGateway(
                    "Payment gateway unavailable. Please try again later.".to_string(),
                )
            }
            LedgerError::InvalidSignature => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid webhook signature"))
            }
            LedgerError::InvalidCurrency { actual, .. } => AppError::UnprocessableEntity(
                anyhow::anyhow!(
                    "Payments in {} are not accepted. Please contact support.",
                    actual
                ),
            ),
            LedgerError::BelowMinimumTopUp { minimum } => AppError::BadRequest(anyhow::anyhow!(
                "The minimum top-up is {} credits.",
                minimum
            )),
            LedgerError::PendingApproval => AppError::Forbidden(anyhow::anyhow!(
                "Your account is pending approval."
            )),
            LedgerError::Forbidden(reason) => AppError::Forbidden(anyhow::anyhow!(reason)),
            LedgerError::AlreadyExists(what) => {
                AppError::Conflict(anyhow::anyhow!("{} already exists", what))
            }
            LedgerError::Validation(errors) => AppError::ValidationError(errors),
            LedgerError::InvalidInput(message) => AppError::BadRequest(anyhow::anyhow!(message)),
            LedgerError::Conflict(_) => AppError::ServiceUnavailable(
                "The account was updated concurrently. Please try again.".to_string(),
            ),
            LedgerError::Database(err) => AppError::DatabaseError(err),
        }
    }
}
