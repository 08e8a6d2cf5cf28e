use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, FileQuery, FileResponse, FileUploadMeta, OptionalUser};
use crate::services::FileService;
use crate::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub file_id: String,
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
}

/// Multipart upload: a `meta` part carrying the listing JSON and a
/// `file` part carrying the payload
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>> {
    let mut meta: Option<FileUploadMeta> = None;
    let mut data: Option<Bytes> = None;
    let mut upload_content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("meta") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read meta: {}", e)))?;
                meta = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| AppError::BadRequest(format!("Invalid meta JSON: {}", e)))?,
                );
            }
            Some("file") => {
                upload_content_type = field.content_type().map(|ct| ct.to_string());
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let meta = meta.ok_or_else(|| AppError::BadRequest("Missing meta part".to_string()))?;
    let data = data.ok_or_else(|| AppError::BadRequest("Missing file part".to_string()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    let file_id = FileService::upload(
        &state.db,
        &state.storage,
        state.deriver.clone(),
        &state.config.points,
        &user.id,
        meta,
        data,
        upload_content_type,
    )
    .await?;

    Ok(Json(ApiResponse::success(UploadResponse { file_id })))
}

pub async fn list_files(
    State(state): State<AppState>,
    Extension(viewer): Extension<OptionalUser>,
    Query(query): Query<FileQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>> {
    let files = FileService::list_files(
        &state.db,
        &state.storage,
        url_ttl(&state),
        viewer.0.as_ref(),
        &query,
    )
    .await?;
    Ok(Json(ApiResponse::success(files)))
}

pub async fn get_file(
    State(state): State<AppState>,
    Extension(viewer): Extension<OptionalUser>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let file = FileService::get_file_detail(
        &state.db,
        &state.storage,
        url_ttl(&state),
        viewer.0.as_ref(),
        &file_id,
    )
    .await?;
    Ok(Json(ApiResponse::success(file)))
}

pub async fn download(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(file_id): Path<String>,
) -> Result<Json<ApiResponse<DownloadResponse>>> {
    let download_url =
        FileService::download_url(&state.db, &state.storage, url_ttl(&state), &user, &file_id)
            .await?;
    Ok(Json(ApiResponse::success(DownloadResponse { download_url })))
}

fn url_ttl(state: &AppState) -> Duration {
    Duration::from_secs(state.config.storage.signed_url_ttl_secs)
}
