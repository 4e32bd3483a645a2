//! Paystack payment gateway client.
//!
//! Wraps the Transaction API: `initialize` opens a hosted checkout and
//! `verify` is the server-side source of truth for whether a reference was
//! paid, in which currency and for how much. Webhook bodies are authenticated
//! with HMAC-SHA512 over the raw body using the secret key.

use crate::config::PaystackConfig;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway credentials not configured")]
    NotConfigured,

    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("invalid transaction reference: {0}")]
    InvalidReference(String),
}

/// Checkout to open for a tenant buying credits.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub reference: String,
    pub email: String,
    pub amount_minor: u64,
    pub currency: String,
    pub tenant_id: String,
}

/// A hosted checkout page the customer is redirected to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// What the gateway reports for a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    pub reference: String,
    pub status: String,
    /// Amount in minor currency units.
    pub amount: u64,
    pub currency: String,
    /// Tenant recorded in the checkout metadata, when present.
    pub tenant_id: Option<String>,
}

impl VerifiedPayment {
    pub fn is_successful(&self) -> bool {
        self.status == "success"
    }
}

/// Payment gateway operations the ledger depends on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError>;

    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: u64,
    currency: &'a str,
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    status: String,
    reference: String,
    amount: u64,
    currency: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// Paystack webhook event. Only `charge.success` is acted on.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookCharge,
}

#[derive(Debug, Deserialize)]
pub struct WebhookCharge {
    pub reference: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl WebhookCharge {
    pub fn tenant_id(&self) -> Option<String> {
        tenant_from_metadata(&self.metadata)
    }
}

/// Paystack echoes metadata back either as an object or as a JSON string.
fn tenant_from_metadata(metadata: &serde_json::Value) -> Option<String> {
    let object = match metadata {
        serde_json::Value::String(raw) => serde_json::from_str(raw).ok()?,
        other => other.clone(),
    };
    object
        .get("tenant_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    config: PaystackConfig,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn read_envelope<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, operation, "Paystack response");

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            tracing::error!(
                status = %status,
                operation,
                message = %message,
                "Paystack request failed"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if !envelope.status {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: envelope.message,
            });
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("missing data".to_string()))
    }

    /// Hex HMAC-SHA512 of `body` under the secret key.
    fn compute_signature(&self, body: &[u8]) -> Option<String> {
        let mut mac =
            Hmac::<Sha512>::new_from_slice(self.config.secret_key.expose_secret().as_bytes())
                .ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(&self, request: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let body = InitializeBody {
            email: &request.email,
            amount: request.amount_minor,
            currency: &request.currency,
            reference: &request.reference,
            callback_url: self.config.callback_url.as_deref(),
            metadata: serde_json::json!({ "tenant_id": request.tenant_id }),
        };

        let response = self
            .client
            .post(self.url("/transaction/initialize"))
            .bearer_auth(self.config.secret_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let session: CheckoutSession = self.read_envelope(response, "initialize").await?;
        tracing::info!(
            reference = %session.reference,
            amount = request.amount_minor,
            currency = %request.currency,
            "Paystack checkout initialized"
        );
        Ok(session)
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }
        if !is_valid_reference(reference) {
            return Err(GatewayError::InvalidReference(reference.to_string()));
        }

        let response = self
            .client
            .get(self.url(&format!("/transaction/verify/{}", reference)))
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await?;

        let data: TransactionData = self.read_envelope(response, "verify").await?;
        Ok(VerifiedPayment {
            tenant_id: tenant_from_metadata(&data.metadata),
            reference: data.reference,
            status: data.status,
            amount: data.amount,
            currency: data.currency,
        })
    }

    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        let Some(expected) = self.compute_signature(body) else {
            return false;
        };
        let provided = signature.trim().to_ascii_lowercase();

        if expected.len() != provided.len() {
            tracing::warn!("Webhook signature verification failed");
            return false;
        }

        let is_valid: bool = expected.as_bytes().ct_eq(provided.as_bytes()).into();
        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }
        is_valid
    }
}

/// Paystack references are alphanumeric plus `-`, `.` and `=`; `_` is
/// accepted for references minted here. Anything else never reaches a URL.
fn is_valid_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 100
        && reference
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'=' | b'_'))
        && !reference.contains("..")
}
