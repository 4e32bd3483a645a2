//! Caller identity extraction.
//!
//! The authenticating front end resolves the session and forwards the caller
//! as `X-User-ID` plus an optional `X-Role` (`owner` when absent). This
//! service never sees credentials.
//!
//! Security: both headers are covered by the request signature, so they are
//! only trusted behind `signature_validation_middleware`.

use crate::ledger::{Principal, Role};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-role";

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header")))?;

        let role = match parts.headers.get(ROLE_HEADER) {
            None => Role::Owner,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(Role::parse)
                .ok_or_else(|| AppError::Forbidden(anyhow::anyhow!("Unknown role")))?,
        };

        tracing::Span::current().record("user_id", user_id);

        Ok(Principal {
            user_id: user_id.to_string(),
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Principal, AppError> {
        let (mut parts, _) = request.into_parts();
        Principal::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn role_defaults_to_owner() {
        let request = Request::builder()
            .header("X-User-ID", "owner-1")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap(), Principal::owner("owner-1"));
    }

    #[tokio::test]
    async fn super_admin_role_is_recognised() {
        let request = Request::builder()
            .header("X-User-ID", "admin-1")
            .header("X-Role", "super_admin")
            .body(())
            .unwrap();
        assert_eq!(
            extract(request).await.unwrap(),
            Principal::super_admin("admin-1")
        );
    }

    #[tokio::test]
    async fn missing_user_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(request).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn unknown_role_is_forbidden() {
        let request = Request::builder()
            .header("X-User-ID", "u1")
            .header("X-Role", "root")
            .body(())
            .unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Forbidden(_))));
    }
}
