use super::{ROLE_HEADER, USER_ID_HEADER};
use crate::config::SigningConfig;
use secrecy::ExposeSecret;
use service_core::middleware::{SignatureConfig, SignatureValidator};

/// Identity headers covered by the request signature, in signing order.
pub const SIGNED_HEADERS: [&str; 2] = [USER_ID_HEADER, ROLE_HEADER];

/// Health checks, metrics and gateway callbacks. Webhooks carry their own signature.
const UNSIGNED_PATHS: [&str; 4] = ["/health", "/ready", "/metrics", "/webhooks/"];

pub fn signature_validator(config: &SigningConfig) -> SignatureValidator {
    SignatureValidator::new(SignatureConfig {
        secret: config.secret.expose_secret().clone(),
        excluded_paths: UNSIGNED_PATHS.iter().map(|p| p.to_string()).collect(),
        signed_headers: SIGNED_HEADERS.iter().map(|h| h.to_string()).collect(),
        max_clock_skew_secs: config.max_clock_skew_secs,
    })
}
