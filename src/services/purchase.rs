use chrono::Utc;
use uuid::Uuid;

use crate::config::PointsConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileAsset, PurchaseRecord, User};
use crate::services::LedgerService;

/// File purchase flow: balance check, debit, counter increment,
/// purchase record, author commission.
pub struct PurchaseService;

impl PurchaseService {
    pub async fn purchase_file(
        db: &Database,
        points: &PointsConfig,
        buyer_id: &str,
        file_id: &str,
    ) -> Result<()> {
        let file: FileAsset = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let buyer: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(buyer_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if buyer.points < file.price {
            return Err(AppError::InsufficientPoints(
                "Insufficient points. Please top up your balance.".to_string(),
            ));
        }

        // The balance check and the debit are separate statements; the
        // storage layer has no cross-step transaction primitive
        LedgerService::debit(db, buyer_id, file.price).await?;

        sqlx::query("UPDATE files SET purchase_count = purchase_count + 1 WHERE id = ?")
            .bind(file_id)
            .execute(db.pool())
            .await?;

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO file_purchases (id, user_id, file_id, points_spent, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(buyer_id)
        .bind(file_id)
        .bind(file.price)
        .bind(&now)
        .execute(db.pool())
        .await?;

        LedgerService::distribute_commission(db, points, &file.author_id, file_id, file.price)
            .await?;

        tracing::info!(
            "User {} purchased file {} for {} points",
            buyer_id,
            file_id,
            file.price
        );
        Ok(())
    }

    /// All purchase records for a buyer, newest first
    pub async fn user_transactions(db: &Database, user_id: &str) -> Result<Vec<PurchaseRecord>> {
        let records: Vec<PurchaseRecord> = sqlx::query_as(
            "SELECT * FROM file_purchases WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(db.pool())
        .await?;
        Ok(records)
    }

    pub async fn bought_files(db: &Database, user_id: &str) -> Result<Vec<String>> {
        let records = Self::user_transactions(db, user_id).await?;
        Ok(records.into_iter().map(|r| r.file_id).collect())
    }

    /// Ownership is the existence of a purchase record for this
    /// (user, file) pair
    pub async fn is_purchased(db: &Database, user_id: &str, file_id: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM file_purchases WHERE user_id = ? AND file_id = ?",
        )
        .bind(user_id)
        .bind(file_id)
        .fetch_one(db.pool())
        .await?;
        Ok(count.0 > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LedgerEntry;
    use crate::services::testutil::{insert_file, insert_user, test_db};

    #[tokio::test]
    async fn successful_purchase_moves_points_and_journals() {
        let db = test_db().await;
        let points = PointsConfig::default();
        insert_user(&db, "author", 0).await;
        insert_user(&db, "buyer", 15).await;
        insert_file(&db, "f1", "author", 10).await;

        PurchaseService::purchase_file(&db, &points, "buyer", "f1")
            .await
            .unwrap();

        assert_eq!(LedgerService::get_balance(&db, "buyer").await.unwrap(), 5);
        assert_eq!(LedgerService::get_balance(&db, "author").await.unwrap(), 1);

        let file: FileAsset = sqlx::query_as("SELECT * FROM files WHERE id = 'f1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(file.purchase_count, 1);

        let records = PurchaseService::user_transactions(&db, "buyer").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].points_spent, 10);

        let commissions: Vec<LedgerEntry> = sqlx::query_as(
            "SELECT * FROM ledger_entries WHERE user_id = 'author' AND reason = 'author_commission'",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(commissions.len(), 1);
        assert_eq!(commissions[0].amount, 1);
    }

    #[tokio::test]
    async fn insufficient_balance_changes_nothing() {
        let db = test_db().await;
        let points = PointsConfig::default();
        insert_user(&db, "author", 0).await;
        insert_user(&db, "buyer", 9).await;
        insert_file(&db, "f1", "author", 10).await;

        let err = PurchaseService::purchase_file(&db, &points, "buyer", "f1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientPoints(_)));

        assert_eq!(LedgerService::get_balance(&db, "buyer").await.unwrap(), 9);
        assert_eq!(LedgerService::get_balance(&db, "author").await.unwrap(), 0);

        let file: FileAsset = sqlx::query_as("SELECT * FROM files WHERE id = 'f1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(file.purchase_count, 0);

        let journal: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(journal.0, 0);
        let purchases: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM file_purchases")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(purchases.0, 0);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let db = test_db().await;
        let points = PointsConfig::default();
        insert_user(&db, "buyer", 100).await;

        let err = PurchaseService::purchase_file(&db, &points, "buyer", "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_buyer_is_not_found() {
        let db = test_db().await;
        let points = PointsConfig::default();
        insert_user(&db, "author", 0).await;
        insert_file(&db, "f1", "author", 10).await;

        let err = PurchaseService::purchase_file(&db, &points, "ghost", "f1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn purchase_counter_tracks_record_count() {
        let db = test_db().await;
        let points = PointsConfig::default();
        insert_user(&db, "author", 0).await;
        insert_user(&db, "b1", 20).await;
        insert_user(&db, "b2", 20).await;
        insert_file(&db, "f1", "author", 10).await;

        PurchaseService::purchase_file(&db, &points, "b1", "f1").await.unwrap();
        PurchaseService::purchase_file(&db, &points, "b2", "f1").await.unwrap();

        let file: FileAsset = sqlx::query_as("SELECT * FROM files WHERE id = 'f1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let records: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM file_purchases WHERE file_id = 'f1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(file.purchase_count, records.0);
        assert_eq!(file.purchase_count, 2);
    }

    #[tokio::test]
    async fn ownership_follows_purchase_record() {
        let db = test_db().await;
        let points = PointsConfig::default();
        insert_user(&db, "author", 0).await;
        insert_user(&db, "buyer", 20).await;
        insert_file(&db, "f1", "author", 10).await;

        assert!(!PurchaseService::is_purchased(&db, "buyer", "f1").await.unwrap());
        PurchaseService::purchase_file(&db, &points, "buyer", "f1").await.unwrap();
        assert!(PurchaseService::is_purchased(&db, "buyer", "f1").await.unwrap());
        assert_eq!(
            PurchaseService::bought_files(&db, "buyer").await.unwrap(),
            vec!["f1".to_string()]
        );
    }
}
