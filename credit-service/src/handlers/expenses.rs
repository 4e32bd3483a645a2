use crate::dtos::{ChargeResponse, ExpenseResponse, ListResponse, PageQuery};
use crate::ledger::Principal;
use crate::models::NewExpense;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

/// Records an expense, charging the configured expense cost.
pub async fn record_expense(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<NewExpense>,
) -> Result<(StatusCode, Json<ChargeResponse>), AppError> {
    let receipt = state.ledger.record_expense(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse<ExpenseResponse>>, AppError> {
    let page = state
        .ledger
        .list_expenses(&principal, query.into())
        .await?;
    Ok(Json(ListResponse::from_page(page)))
}
