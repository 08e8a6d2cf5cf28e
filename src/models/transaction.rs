use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Immutable purchase fact: buyer spent points on a file
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PurchaseRecord {
    pub id: String,
    pub user_id: String,
    pub file_id: String,
    pub points_spent: i64,
    pub created_at: String,
}

/// Reason tag for a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    UploadReward,
    AuthorCommission,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::UploadReward => "upload_reward",
            LedgerReason::AuthorCommission => "author_commission",
        }
    }
}

/// Append-only record of a balance-affecting reward or commission.
/// Never updated, never deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub file_id: Option<String>,
    pub amount: i64,
    pub reason: String,
    pub created_at: String,
}

/// External point top-up; payment verification happens upstream and is
/// opaque here
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PointPurchase {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub payment_method: String,
    pub payment_meta: Option<String>,
    pub created_at: String,
}

/// Top-up request; the payment token is assumed already verified
#[derive(Debug, Deserialize)]
pub struct PurchasePointsRequest {
    pub amount: i64,
    pub payment_method: String,
    pub payment_token: String,
}

/// Purchase request
#[derive(Debug, Deserialize)]
pub struct PurchaseFileRequest {
    pub file_id: String,
}

/// One entry of the combined account history: ledger entries and
/// point top-ups merged into a single chronological view. Tagged
/// variant with a shared timestamp ordering key.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionView {
    Reward {
        id: String,
        amount: i64,
        reason: String,
        file_id: Option<String>,
        created_at: String,
    },
    PointPurchase {
        id: String,
        amount: i64,
        payment_method: String,
        created_at: String,
    },
}

impl TransactionView {
    pub fn created_at(&self) -> &str {
        match self {
            TransactionView::Reward { created_at, .. } => created_at,
            TransactionView::PointPurchase { created_at, .. } => created_at,
        }
    }

    /// Parsed ordering key for the merged history. Stored timestamps
    /// come in two shapes: RFC 3339 from explicit binds and SQLite's
    /// `datetime('now')` default; comparing the raw strings would
    /// interleave them wrongly, so both are parsed to UTC instants.
    pub fn timestamp(&self) -> DateTime<Utc> {
        parse_stored_timestamp(self.created_at())
    }
}

pub(crate) fn parse_stored_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc())
        })
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl From<LedgerEntry> for TransactionView {
    fn from(e: LedgerEntry) -> Self {
        TransactionView::Reward {
            id: e.id,
            amount: e.amount,
            reason: e.reason,
            file_id: e.file_id,
            created_at: e.created_at,
        }
    }
}

impl From<PointPurchase> for TransactionView {
    fn from(p: PointPurchase) -> Self {
        TransactionView::PointPurchase {
            id: p.id,
            amount: p.amount,
            payment_method: p.payment_method,
            created_at: p.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_stored_timestamp_shapes_parse_to_the_same_instant() {
        let rfc = parse_stored_timestamp("2024-06-01T09:00:00+00:00");
        let sqlite = parse_stored_timestamp("2024-06-01 09:00:00");
        assert_eq!(rfc, sqlite);
    }

    #[test]
    fn unparseable_timestamp_sorts_to_the_epoch() {
        assert_eq!(parse_stored_timestamp("whenever"), DateTime::<Utc>::UNIX_EPOCH);
    }
}
