use chrono::Utc;
use uuid::Uuid;

use crate::config::PointsConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    LedgerEntry, LedgerReason, PointPurchase, PurchasePointsRequest, TransactionView, User,
};

/// Points ledger. Balances move only through the operations here; every
/// reward and commission leaves an append-only journal entry.
pub struct LedgerService;

impl LedgerService {
    /// Atomic relative credit. The adjustment happens in a single
    /// UPDATE, so concurrent credits on one account never lose updates.
    pub async fn credit(db: &Database, user_id: &str, amount: i64) -> Result<()> {
        let result = sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    /// Atomic relative debit. Does not enforce non-negativity; callers
    /// check the balance first (see PurchaseService).
    pub async fn debit(db: &Database, user_id: &str, amount: i64) -> Result<()> {
        Self::credit(db, user_id, -amount).await
    }

    /// Conditional compare-and-decrement: debits only if the balance
    /// covers the amount, in one statement. Hardened alternative to the
    /// check-then-act sequence; not used by the purchase flow.
    pub async fn try_debit(db: &Database, user_id: &str, amount: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET points = points - ? WHERE id = ? AND points >= ?")
                .bind(amount)
                .bind(user_id)
                .bind(amount)
                .execute(db.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_balance(db: &Database, user_id: &str) -> Result<i64> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(user.points)
    }

    /// Credit the flat upload reward and journal it
    pub async fn reward_upload(
        db: &Database,
        points: &PointsConfig,
        user_id: &str,
        file_id: &str,
    ) -> Result<()> {
        Self::credit(db, user_id, points.upload_reward).await?;
        Self::append_entry(
            db,
            user_id,
            Some(file_id),
            points.upload_reward,
            LedgerReason::UploadReward,
        )
        .await
    }

    /// Pay the author their share of a sale. A commission of zero
    /// credits nothing and journals nothing.
    pub async fn distribute_commission(
        db: &Database,
        points: &PointsConfig,
        author_id: &str,
        file_id: &str,
        total_price: i64,
    ) -> Result<i64> {
        let author: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(author_id)
            .fetch_optional(db.pool())
            .await?;
        if author.is_none() {
            return Err(AppError::NotFound("Author not found".to_string()));
        }

        let commission = total_price * points.commission_rate_percent / 100;
        if commission <= 0 {
            return Ok(0);
        }

        Self::credit(db, author_id, commission).await?;
        Self::append_entry(
            db,
            author_id,
            Some(file_id),
            commission,
            LedgerReason::AuthorCommission,
        )
        .await?;

        Ok(commission)
    }

    /// External top-up. Payment verification happens upstream; only the
    /// last four characters of the opaque token are kept as metadata.
    pub async fn purchase_points(
        db: &Database,
        user_id: &str,
        req: PurchasePointsRequest,
    ) -> Result<()> {
        if req.amount <= 0 {
            return Err(AppError::BadRequest("Amount must be positive".to_string()));
        }

        Self::credit(db, user_id, req.amount).await?;

        let meta: String = req
            .payment_token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO point_purchases (id, user_id, amount, payment_method, payment_meta, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(req.amount)
        .bind(&req.payment_method)
        .bind(&meta)
        .bind(&now)
        .execute(db.pool())
        .await?;

        Ok(())
    }

    /// Combined account history: ledger entries and point top-ups merged
    /// and sorted by timestamp, newest first. Equal timestamps keep
    /// merge order.
    pub async fn list_transactions(db: &Database, user_id: &str) -> Result<Vec<TransactionView>> {
        let rewards: Vec<LedgerEntry> =
            sqlx::query_as("SELECT * FROM ledger_entries WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(db.pool())
                .await?;
        let purchases: Vec<PointPurchase> =
            sqlx::query_as("SELECT * FROM point_purchases WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(db.pool())
                .await?;

        let mut combined: Vec<TransactionView> = rewards
            .into_iter()
            .map(TransactionView::from)
            .chain(purchases.into_iter().map(TransactionView::from))
            .collect();
        combined.sort_by_key(|t| std::cmp::Reverse(t.timestamp()));

        Ok(combined)
    }

    /// Append-only journal insert; there is no update or delete path
    async fn append_entry(
        db: &Database,
        user_id: &str,
        file_id: Option<&str>,
        amount: i64,
        reason: LedgerReason,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, user_id, file_id, amount, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(file_id)
        .bind(amount)
        .bind(reason.as_str())
        .bind(&now)
        .execute(db.pool())
        .await?;
        Ok(())
    }
}
