use crate::dtos::{AccountResponse, ActivityResponse, ListResponse, PageQuery};
use crate::ledger::Principal;
use crate::models::RegisterTenant;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

/// Registers the caller's carwash. The account starts pending approval.
pub async fn register_tenant(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<RegisterTenant>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let tenant = state.ledger.register_tenant(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(tenant.into())))
}

pub async fn get_account(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<AccountResponse>, AppError> {
    let tenant = state.ledger.account(&principal).await?;
    Ok(Json(tenant.into()))
}

pub async fn list_activities(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<ActivityResponse>>, AppError> {
    let page = state
        .ledger
        .list_activities(&principal, query.into())
        .await?;
    Ok(Json(ListResponse::from_page(page)))
}
