use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::PointsConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    CurrentUser, FileAsset, FileQuery, FileResponse, FileUploadMeta, ViewerStatus,
};
use crate::preview::VariantDeriver;
use crate::services::{LedgerService, PurchaseService};
use crate::storage::{BlobProvider, BlobStore};

/// File ingestion and viewer-scoped rendering
pub struct FileService;

impl FileService {
    /// Upload a file: derive variants, store all blobs, persist
    /// metadata, credit the upload reward. Returns the new file id.
    ///
    /// A failed required derivation aborts the whole upload before any
    /// metadata or ledger write; blobs written up to that point are
    /// orphaned (no cleanup sweep exists).
    pub async fn upload(
        db: &Database,
        blobs: &BlobStore,
        deriver: Arc<VariantDeriver>,
        points: &PointsConfig,
        author_id: &str,
        meta: FileUploadMeta,
        data: Bytes,
        upload_content_type: Option<String>,
    ) -> Result<String> {
        meta.validate(points.min_price)?;

        let declared_type = meta.file_type.clone();
        let payload = data.clone();
        let variants = tokio::task::spawn_blocking(move || {
            deriver.derive(&payload, &declared_type)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Derivation task failed: {}", e)))??;

        let provider = blobs.provider();
        let original_type = upload_content_type.unwrap_or_else(|| meta.file_type.clone());

        // The three blob writes are independent
        let original = provider.put(data, &original_type);
        let thumbnail = async {
            match &variants.thumbnail {
                Some(artifact) => provider
                    .put(Bytes::from(artifact.bytes.clone()), &artifact.content_type)
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };
        let preview = provider.put(
            Bytes::from(variants.preview.bytes.clone()),
            &variants.preview.content_type,
        );
        let (file_key, thumbnail_key, preview_key) =
            tokio::try_join!(original, thumbnail, preview)?;

        let file_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let tags = serde_json::to_string(&meta.tags)
            .map_err(|e| AppError::Internal(format!("Failed to serialize tags: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO files (id, author_id, title, description, tags, file_type, price,
                               file_key, thumbnail_key, preview_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file_id)
        .bind(author_id)
        .bind(&meta.title)
        .bind(meta.description.as_deref().unwrap_or(""))
        .bind(&tags)
        .bind(&meta.file_type)
        .bind(meta.price)
        .bind(&file_key)
        .bind(&thumbnail_key)
        .bind(&preview_key)
        .bind(&now)
        .execute(db.pool())
        .await?;

        LedgerService::reward_upload(db, points, author_id, &file_id).await?;

        tracing::info!("User {} uploaded file {} ({})", author_id, file_id, meta.file_type);
        Ok(file_id)
    }

    pub async fn get_file(db: &Database, file_id: &str) -> Result<FileAsset> {
        let file: FileAsset = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
        Ok(file)
    }

    /// List files, viewer-scoped; list granularity never includes
    /// preview or original URLs
    pub async fn list_files(
        db: &Database,
        blobs: &BlobStore,
        url_ttl: Duration,
        viewer: Option<&CurrentUser>,
        query: &FileQuery,
    ) -> Result<Vec<FileResponse>> {
        let files: Vec<FileAsset> =
            sqlx::query_as("SELECT * FROM files ORDER BY created_at DESC")
                .fetch_all(db.pool())
                .await?;

        let tag_filter: Vec<String> = split_csv(query.tags.as_deref());
        let type_filter: Vec<String> = split_csv(query.file_types.as_deref());

        let mut responses = Vec::new();
        for file in files {
            if !tag_filter.is_empty() {
                let tags = file.tag_list();
                if !tag_filter.iter().all(|t| tags.contains(t)) {
                    continue;
                }
            }
            if !type_filter.is_empty() && !type_filter.contains(&file.file_type) {
                continue;
            }
            responses.push(Self::build_response(db, blobs, url_ttl, file, viewer, false).await?);
        }

        Ok(responses)
    }

    pub async fn get_file_detail(
        db: &Database,
        blobs: &BlobStore,
        url_ttl: Duration,
        viewer: Option<&CurrentUser>,
        file_id: &str,
    ) -> Result<FileResponse> {
        let file = Self::get_file(db, file_id).await?;
        Self::build_response(db, blobs, url_ttl, file, viewer, true).await
    }

    /// Signed URL for the original. Only the author or an owner may
    /// download; the author never pays and never creates a purchase
    /// record, but every eligible download bumps the download counter.
    pub async fn download_url(
        db: &Database,
        blobs: &BlobStore,
        url_ttl: Duration,
        viewer: &CurrentUser,
        file_id: &str,
    ) -> Result<String> {
        let file = Self::get_file(db, file_id).await?;
        let status = Self::viewer_status(db, &file, Some(viewer)).await?;

        if !status.can_access_original() {
            return Err(AppError::Forbidden(
                "Purchase required to download this file".to_string(),
            ));
        }

        sqlx::query("UPDATE files SET download_count = download_count + 1 WHERE id = ?")
            .bind(file_id)
            .execute(db.pool())
            .await?;

        Ok(blobs.provider().signed_url(&file.file_key, url_ttl))
    }

    /// Derive the caller's access tier relative to a file
    async fn viewer_status(
        db: &Database,
        file: &FileAsset,
        viewer: Option<&CurrentUser>,
    ) -> Result<ViewerStatus> {
        let Some(viewer) = viewer else {
            return Ok(ViewerStatus::NotLoggedIn);
        };

        if viewer.id == file.author_id {
            return Ok(ViewerStatus::Author);
        }
        if PurchaseService::is_purchased(db, &viewer.id, &file.id).await? {
            return Ok(ViewerStatus::Owner);
        }
        Ok(ViewerStatus::LoggedIn)
    }

    /// Viewer-scoped rendering: thumbnail always, preview only at detail
    /// granularity, original only for author/owner and only at detail
    async fn build_response(
        db: &Database,
        blobs: &BlobStore,
        url_ttl: Duration,
        file: FileAsset,
        viewer: Option<&CurrentUser>,
        detail: bool,
    ) -> Result<FileResponse> {
        let status = Self::viewer_status(db, &file, viewer).await?;
        let provider = blobs.provider();

        let thumbnail_url = file
            .thumbnail_key
            .as_deref()
            .map(|key| provider.signed_url(key, url_ttl));

        let mut preview_url = None;
        let mut file_url = None;
        if detail {
            preview_url = file
                .preview_key
                .as_deref()
                .map(|key| provider.signed_url(key, url_ttl));
            if status.can_access_original() {
                file_url = Some(provider.signed_url(&file.file_key, url_ttl));
            }
        }

        Ok(FileResponse {
            id: file.id,
            author_id: file.author_id,
            title: file.title,
            description: file.description,
            file_type: file.file_type,
            price: file.price,
            tags: serde_json::from_str(&file.tags).unwrap_or_default(),
            purchase_count: file.purchase_count,
            download_count: file.download_count,
            upload_date: file.created_at,
            thumbnail_url,
            preview_url,
            file_url,
            viewer_status: status,
        })
    }
}

fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
