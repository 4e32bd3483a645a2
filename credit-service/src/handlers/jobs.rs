use crate::dtos::{ChargeResponse, JobResponse, ListResponse, PageQuery};
use crate::ledger::Principal;
use crate::models::NewJob;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

/// Creates a job card, charging the configured job card cost.
pub async fn create_job(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<NewJob>,
) -> Result<(StatusCode, Json<ChargeResponse>), AppError> {
    let receipt = state.ledger.create_job(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<JobResponse>>, AppError> {
    let page = state.ledger.list_jobs(&principal, query.into()).await?;
    Ok(Json(ListResponse::from_page(page)))
}
