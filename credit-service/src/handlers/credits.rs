//! Credit purchase handlers.
//!
//! The client opens a checkout, pays on the gateway's hosted page, then
//! calls `verify` with the reference. The webhook path may have credited the
//! reference already; verify then reports it as already applied.

use crate::dtos::{
    CheckoutBody, CheckoutResponse, ListResponse, PageQuery, TopUpResponse, VerifyTopUpBody,
    VerifyTopUpResponse,
};
use crate::ledger::Principal;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn begin_checkout(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    payload.validate()?;
    let checkout = state
        .ledger
        .begin_top_up(&principal, payload.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(checkout.into())))
}

pub async fn verify_top_up(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<VerifyTopUpBody>,
) -> Result<Json<VerifyTopUpResponse>, AppError> {
    payload.validate()?;
    let outcome = state
        .ledger
        .confirm_top_up(&principal, &payload.reference)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn list_top_ups(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<TopUpResponse>>, AppError> {
    let page = state.ledger.list_top_ups(&principal, query.into()).await?;
    Ok(Json(ListResponse::from_page(page)))
}
