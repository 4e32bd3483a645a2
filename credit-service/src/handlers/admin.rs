//! Pricing and tenant administration.

use crate::dtos::{AccountResponse, ApprovalResponse, PricingResponse, TenantListQuery};
use crate::ledger::Principal;
use crate::models::PricingUpdate;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;

/// Current prices, readable by any authenticated caller.
pub async fn get_pricing(
    State(state): State<AppState>,
    _principal: Principal,
) -> Result<Json<PricingResponse>, AppError> {
    let pricing = state.ledger.pricing().await?;
    Ok(Json(pricing.into()))
}

pub async fn update_pricing(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<PricingUpdate>,
) -> Result<Json<PricingResponse>, AppError> {
    let pricing = state.ledger.update_pricing(&principal, payload).await?;
    Ok(Json(pricing.into()))
}

pub async fn list_tenants(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<TenantListQuery>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let tenants = state.ledger.list_tenants(&principal, query.status).await?;
    Ok(Json(tenants.into_iter().map(AccountResponse::from).collect()))
}

pub async fn approve_tenant(
    State(state): State<AppState>,
    principal: Principal,
    Path(tenant_id): Path<String>,
) -> Result<Json<ApprovalResponse>, AppError> {
    let outcome = state.ledger.approve_tenant(&principal, &tenant_id).await?;
    Ok(Json(outcome.into()))
}
