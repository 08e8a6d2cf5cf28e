use axum::{extract::State, Json};

use crate::error::{ApiResponse, Result};
use crate::models::{CreateUserRequest, LoginRequest, LoginResponse, UserResponse};
use crate::services::AuthService;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = AuthService::register(&state.db, req).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>> {
    let response = AuthService::login(&state.db, &state.config.jwt, req).await?;
    Ok(Json(ApiResponse::success(response)))
}
