use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

/// File asset model. Blob keys are write-once at creation; the
/// purchase and download counters only ever increment.
#[derive(Debug, Clone, FromRow)]
pub struct FileAsset {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub description: String,
    /// JSON array of tag strings
    pub tags: String,
    pub file_type: String,
    pub price: i64,
    pub file_key: String,
    pub thumbnail_key: Option<String>,
    pub preview_key: Option<String>,
    pub purchase_count: i64,
    pub download_count: i64,
    pub created_at: String,
}

impl FileAsset {
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}

/// Upload metadata, sent as a JSON part alongside the raw file
#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub file_type: String,
    pub price: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FileUploadMeta {
    /// Validate metadata before anything touches storage or the ledger
    pub fn validate(&self, min_price: i64) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::BadRequest("Title must not be empty".to_string()));
        }
        if self.file_type.trim().is_empty() {
            return Err(AppError::BadRequest("File type must not be empty".to_string()));
        }
        if self.price < min_price {
            return Err(AppError::BadRequest(format!(
                "Price must be at least {} points",
                min_price
            )));
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(AppError::BadRequest("Tags must not be empty".to_string()));
        }
        Ok(())
    }
}

/// The caller's access tier relative to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerStatus {
    NotLoggedIn,
    LoggedIn,
    Author,
    Owner,
}

impl ViewerStatus {
    pub fn can_access_original(&self) -> bool {
        matches!(self, ViewerStatus::Author | ViewerStatus::Owner)
    }
}

/// Viewer-scoped file rendering. Which URLs are present depends on the
/// viewer status and on list vs detail granularity.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub description: String,
    pub file_type: String,
    pub price: i64,
    pub tags: Vec<String>,
    pub purchase_count: i64,
    pub download_count: i64,
    pub upload_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub viewer_status: ViewerStatus,
}

/// File list query parameters
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    /// Comma-separated tags; every tag must match
    pub tags: Option<String>,
    /// Comma-separated declared types; any may match
    pub file_types: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(price: i64) -> FileUploadMeta {
        FileUploadMeta {
            title: "Sunset".to_string(),
            description: None,
            file_type: "image/png".to_string(),
            price,
            tags: vec!["nature".to_string()],
        }
    }

    #[test]
    fn price_below_floor_is_rejected() {
        let err = meta(3).validate(4).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn price_at_floor_is_accepted() {
        assert!(meta(4).validate(4).is_ok());
    }

    #[test]
    fn empty_title_is_rejected() {
        let mut m = meta(10);
        m.title = "  ".to_string();
        assert!(m.validate(4).is_err());
    }
}
