use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A comment left on a file's listing
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub file_id: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub file_id: String,
    pub content: String,
}

/// One user's rating of a file; re-rating replaces the previous value
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Rating {
    pub id: String,
    pub user_id: String,
    pub file_id: String,
    pub value: i64,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct RateFileRequest {
    pub file_id: String,
    pub value: i64,
}

/// Aggregate rating for a file; 0.0 when nobody has rated yet
#[derive(Debug, Serialize)]
pub struct AverageRating {
    pub average: f64,
    pub count: i64,
}

/// The caller's own rating of a file; 0 when unrated
#[derive(Debug, Serialize)]
pub struct UserRating {
    pub value: i64,
}
