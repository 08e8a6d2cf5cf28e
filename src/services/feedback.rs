use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{AverageRating, Comment, Rating};
use crate::services::FileService;

/// Comments and ratings on file listings
pub struct FeedbackService;

impl FeedbackService {
    pub async fn add_comment(
        db: &Database,
        user_id: &str,
        file_id: &str,
        content: &str,
    ) -> Result<String> {
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("Comment must not be empty".to_string()));
        }
        FileService::get_file(db, file_id).await?;

        let comment_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO comments (id, user_id, file_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comment_id)
        .bind(user_id)
        .bind(file_id)
        .bind(content)
        .bind(&now)
        .execute(db.pool())
        .await?;

        Ok(comment_id)
    }

    /// All comments on a file, newest first
    pub async fn comments_for_file(db: &Database, file_id: &str) -> Result<Vec<Comment>> {
        let comments: Vec<Comment> = sqlx::query_as(
            "SELECT * FROM comments WHERE file_id = ? ORDER BY created_at DESC",
        )
        .bind(file_id)
        .fetch_all(db.pool())
        .await?;
        Ok(comments)
    }

    /// The caller's own comment texts on a file
    pub async fn user_comments_for_file(
        db: &Database,
        user_id: &str,
        file_id: &str,
    ) -> Result<Vec<String>> {
        let comments: Vec<Comment> = sqlx::query_as(
            "SELECT * FROM comments WHERE user_id = ? AND file_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(file_id)
        .fetch_all(db.pool())
        .await?;
        Ok(comments.into_iter().map(|c| c.content).collect())
    }

    /// One rating per (user, file); rating again replaces the old value
    pub async fn rate_file(
        db: &Database,
        user_id: &str,
        file_id: &str,
        value: i64,
    ) -> Result<()> {
        if !(1..=5).contains(&value) {
            return Err(AppError::BadRequest(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        FileService::get_file(db, file_id).await?;

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO ratings (id, user_id, file_id, value, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, file_id)
            DO UPDATE SET value = excluded.value, created_at = excluded.created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(file_id)
        .bind(value)
        .bind(&now)
        .execute(db.pool())
        .await?;

        Ok(())
    }

    pub async fn average_rating(db: &Database, file_id: &str) -> Result<AverageRating> {
        let row: (Option<f64>, i64) =
            sqlx::query_as("SELECT AVG(value), COUNT(*) FROM ratings WHERE file_id = ?")
                .bind(file_id)
                .fetch_one(db.pool())
                .await?;
        Ok(AverageRating {
            average: row.0.unwrap_or(0.0),
            count: row.1,
        })
    }

    /// The caller's rating of a file, 0 when unrated
    pub async fn user_rating(db: &Database, user_id: &str, file_id: &str) -> Result<i64> {
        let rating: Option<Rating> =
            sqlx::query_as("SELECT * FROM ratings WHERE user_id = ? AND file_id = ?")
                .bind(user_id)
                .bind(file_id)
                .fetch_optional(db.pool())
                .await?;
        Ok(rating.map(|r| r.value).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::{insert_file, insert_user, test_db};

    #[tokio::test]
    async fn comments_attach_to_file_newest_first() {
        let db = test_db().await;
        insert_user(&db, "author", 0).await;
        insert_user(&db, "alice", 0).await;
        insert_file(&db, "f1", "author", 10).await;

        FeedbackService::add_comment(&db, "alice", "f1", "first").await.unwrap();
        FeedbackService::add_comment(&db, "alice", "f1", "second").await.unwrap();
        sqlx::query("UPDATE comments SET created_at = '2024-01-01T00:00:00Z' WHERE content = 'first'")
            .execute(db.pool())
            .await
            .unwrap();

        let comments = FeedbackService::comments_for_file(&db, "f1").await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "second");

        let own = FeedbackService::user_comments_for_file(&db, "alice", "f1")
            .await
            .unwrap();
        assert_eq!(own, vec!["second".to_string(), "first".to_string()]);
    }

    #[tokio::test]
    async fn comment_on_missing_file_is_not_found() {
        let db = test_db().await;
        insert_user(&db, "alice", 0).await;
        let err = FeedbackService::add_comment(&db, "alice", "ghost", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_comment_is_rejected() {
        let db = test_db().await;
        insert_user(&db, "author", 0).await;
        insert_file(&db, "f1", "author", 10).await;
        let err = FeedbackService::add_comment(&db, "author", "f1", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn rerating_replaces_instead_of_duplicating() {
        let db = test_db().await;
        insert_user(&db, "author", 0).await;
        insert_user(&db, "alice", 0).await;
        insert_file(&db, "f1", "author", 10).await;

        FeedbackService::rate_file(&db, "alice", "f1", 2).await.unwrap();
        FeedbackService::rate_file(&db, "alice", "f1", 5).await.unwrap();

        assert_eq!(FeedbackService::user_rating(&db, "alice", "f1").await.unwrap(), 5);
        let avg = FeedbackService::average_rating(&db, "f1").await.unwrap();
        assert_eq!(avg.count, 1);
        assert_eq!(avg.average, 5.0);
    }

    #[tokio::test]
    async fn average_spans_users_and_defaults_to_zero() {
        let db = test_db().await;
        insert_user(&db, "author", 0).await;
        insert_user(&db, "alice", 0).await;
        insert_user(&db, "bob", 0).await;
        insert_file(&db, "f1", "author", 10).await;

        let empty = FeedbackService::average_rating(&db, "f1").await.unwrap();
        assert_eq!(empty.average, 0.0);
        assert_eq!(empty.count, 0);

        FeedbackService::rate_file(&db, "alice", "f1", 4).await.unwrap();
        FeedbackService::rate_file(&db, "bob", "f1", 2).await.unwrap();

        let avg = FeedbackService::average_rating(&db, "f1").await.unwrap();
        assert_eq!(avg.count, 2);
        assert_eq!(avg.average, 3.0);

        assert_eq!(FeedbackService::user_rating(&db, "ghost", "f1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected() {
        let db = test_db().await;
        insert_user(&db, "author", 0).await;
        insert_file(&db, "f1", "author", 10).await;

        for bad in [0, 6, -1] {
            let err = FeedbackService::rate_file(&db, "author", "f1", bad)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "value {}", bad);
        }
    }
}
