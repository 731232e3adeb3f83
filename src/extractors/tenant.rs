//! Request identity: tenant id from `X-Tenant-ID`, service secret from `X-Service-Key`.

use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";
pub const SERVICE_KEY_HEADER: &str = "X-Service-Key";

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Tenant the request acts for. Missing or blank header is a 400.
#[derive(Clone, Debug)]
pub struct TenantId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header(parts, TENANT_ID_HEADER)
            .map(TenantId)
            .ok_or_else(|| AppError::BadRequest(format!("{} header is required", TENANT_ID_HEADER)))
    }
}

/// Proof that the caller holds the configured service secret.
#[derive(Clone, Copy, Debug)]
pub struct ServiceKey;

#[async_trait]
impl FromRequestParts<AppState> for ServiceKey {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected = state
            .service_key
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("privileged routes are disabled".into()))?;
        match header(parts, SERVICE_KEY_HEADER) {
            Some(k) if k == expected => Ok(ServiceKey),
            Some(_) => Err(AppError::Unauthorized("invalid service key".into())),
            None => Err(AppError::Unauthorized(format!("{} header is required", SERVICE_KEY_HEADER))),
        }
    }
}
