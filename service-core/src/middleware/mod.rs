pub mod metrics;
pub mod signature;
pub mod tracing;

pub use self::metrics::metrics_middleware;
pub use self::signature::{
    SignatureConfig, SignatureValidator, signature_validation_middleware, signed_identity,
};
pub use self::tracing::{REQUEST_ID_HEADER, request_id_middleware};
