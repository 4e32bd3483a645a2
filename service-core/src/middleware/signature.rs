//! Request signature validation.
//!
//! The front end that authenticates users forwards their identity in plain
//! headers. Those headers are only trusted when the request carries a valid
//! HMAC signature over the method, path, timestamp, nonce, identity headers
//! and body, made with the secret shared with that front end.

use crate::error::AppError;
use crate::utils::signature::{SigningInput, verify_signature};
use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const NONCE_HEADER: &str = "x-nonce";
pub const SIGNATURE_HEADER: &str = "x-signature";

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct SignatureConfig {
    pub secret: String,
    /// Paths (or path prefixes) served without a signature.
    pub excluded_paths: Vec<String>,
    /// Identity headers bound into the signature, in signing order.
    pub signed_headers: Vec<String>,
    pub max_clock_skew_secs: i64,
}

/// Shared validator state: configuration plus recently used nonces.
#[derive(Clone)]
pub struct SignatureValidator {
    config: Arc<SignatureConfig>,
    seen_nonces: Arc<Mutex<HashMap<String, i64>>>,
}

impl SignatureValidator {
    pub fn new(config: SignatureConfig) -> Self {
        Self {
            config: Arc::new(config),
            seen_nonces: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.config
            .excluded_paths
            .iter()
            .any(|p| path == p || path.starts_with(p.as_str()))
    }

    /// Records `nonce`. Returns false if it was already used in the window.
    async fn claim_nonce(&self, nonce: &str, now: i64) -> bool {
        let horizon = 2 * self.config.max_clock_skew_secs;
        let mut seen = self.seen_nonces.lock().await;
        seen.retain(|_, used_at| now - *used_at <= horizon);

        match seen.entry(nonce.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }
}

/// Joins the configured identity headers with `\n`; absent headers sign as empty.
pub fn signed_identity<S: AsRef<str>>(headers: &HeaderMap, names: &[S]) -> String {
    names
        .iter()
        .map(|name| {
            headers
                .get(name.as_ref())
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn signature_validation_middleware(
    State(validator): State<SignatureValidator>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if validator.is_excluded(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let config = validator.config();
    if config.secret.is_empty() {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Request signing is not configured"
        )));
    }

    let timestamp: i64 = get_header(req.headers(), TIMESTAMP_HEADER)?
        .parse()
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid timestamp format")))?;
    let nonce = get_header(req.headers(), NONCE_HEADER)?;
    let signature = get_header(req.headers(), SIGNATURE_HEADER)?;

    let now = chrono::Utc::now().timestamp();
    if (now - timestamp).abs() > config.max_clock_skew_secs {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Request timestamp expired"
        )));
    }

    let identity = signed_identity(req.headers(), &config.signed_headers);
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read body: {}", e)))?;

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| parts.uri.path());

    let input = SigningInput {
        method: parts.method.as_str(),
        path,
        timestamp,
        nonce: &nonce,
        identity: &identity,
        body: &bytes,
    };
    let is_valid = verify_signature(&config.secret, &input, &signature).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Signature verification error: {}", e))
    })?;

    if !is_valid {
        tracing::warn!(path = %parts.uri.path(), "Invalid request signature");
        return Err(AppError::Unauthorized(anyhow::anyhow!("Invalid signature")));
    }

    if !validator.claim_nonce(&nonce, now).await {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Replay detected (nonce used)"
        )));
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

fn get_header(headers: &HeaderMap, key: &str) -> Result<String, AppError> {
    headers
        .get(key)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing header: {}", key)))?
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid header format: {}", key)))
}
