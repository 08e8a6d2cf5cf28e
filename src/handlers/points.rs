use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::error::{ApiResponse, Result};
use crate::models::{CurrentUser, PurchasePointsRequest, TransactionView};
use crate::services::LedgerService;
use crate::AppState;

#[derive(Serialize)]
pub struct BalanceResponse {
    pub points: i64,
}

pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<BalanceResponse>>> {
    let points = LedgerService::get_balance(&state.db, &user.id).await?;
    Ok(Json(ApiResponse::success(BalanceResponse { points })))
}

pub async fn purchase_points(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PurchasePointsRequest>,
) -> Result<Json<ApiResponse<BalanceResponse>>> {
    LedgerService::purchase_points(&state.db, &user.id, req).await?;
    let points = LedgerService::get_balance(&state.db, &user.id).await?;
    Ok(Json(ApiResponse::success(BalanceResponse { points })))
}

pub async fn transactions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<TransactionView>>>> {
    let history = LedgerService::list_transactions(&state.db, &user.id).await?;
    Ok(Json(ApiResponse::success(history)))
}
