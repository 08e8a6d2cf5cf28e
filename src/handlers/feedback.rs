use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;

use crate::error::{ApiResponse, Result};
use crate::models::{
    AverageRating, Comment, CreateCommentRequest, CurrentUser, RateFileRequest, UserRating,
};
use crate::services::FeedbackService;
use crate::AppState;

#[derive(Serialize)]
pub struct CommentCreatedResponse {
    pub comment_id: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<Json<ApiResponse<CommentCreatedResponse>>> {
    let comment_id =
        FeedbackService::add_comment(&state.db, &user.id, &req.file_id, &req.content).await?;
    Ok(Json(ApiResponse::success(CommentCreatedResponse { comment_id })))
}

pub async fn comments_for_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Comment>>>> {
    let comments = FeedbackService::comments_for_file(&state.db, &file_id).await?;
    Ok(Json(ApiResponse::success(comments)))
}

pub async fn own_comments_for_file(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    let texts = FeedbackService::user_comments_for_file(&state.db, &user.id, &file_id).await?;
    Ok(Json(ApiResponse::success(texts)))
}

pub async fn rate_file(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<RateFileRequest>,
) -> Result<Json<ApiResponse<()>>> {
    FeedbackService::rate_file(&state.db, &user.id, &req.file_id, req.value).await?;
    Ok(Json(ApiResponse::<()>::success_message("Rating saved")))
}

pub async fn average_rating(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<AverageRating>>> {
    let avg = FeedbackService::average_rating(&state.db, &file_id).await?;
    Ok(Json(ApiResponse::success(avg)))
}

pub async fn own_rating(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<UserRating>>> {
    let value = FeedbackService::user_rating(&state.db, &user.id, &file_id).await?;
    Ok(Json(ApiResponse::success(UserRating { value })))
}
