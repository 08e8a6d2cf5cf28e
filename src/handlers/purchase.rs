use axum::{extract::State, Extension, Json};

use crate::error::{ApiResponse, Result};
use crate::models::{CurrentUser, PurchaseFileRequest, PurchaseRecord};
use crate::services::PurchaseService;
use crate::AppState;

pub async fn purchase_file(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PurchaseFileRequest>,
) -> Result<Json<ApiResponse<()>>> {
    PurchaseService::purchase_file(&state.db, &state.config.points, &user.id, &req.file_id)
        .await?;
    Ok(Json(ApiResponse::<()>::success_message("Purchase completed")))
}

pub async fn purchase_history(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<PurchaseRecord>>>> {
    let records = PurchaseService::user_transactions(&state.db, &user.id).await?;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn bought_files(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    let ids = PurchaseService::bought_files(&state.db, &user.id).await?;
    Ok(Json(ApiResponse::success(ids)))
}
