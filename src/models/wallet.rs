use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::pagination::{Page, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransactionType {
    Deposit,
    Escrow,
    Release,
    Withdrawal,
    Refund,
    Fee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Hold,
    Cancelled,
}

/// Wallet
///
/// One per user. `balance_cents` never goes negative; every change to it is paired with
/// a ledger row written in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance_cents: i64,
    pub currency: String,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Transaction
///
/// An append-only ledger row. A `release` row points at the `escrow` row it settles via
/// `reference_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Transaction {
    pub id: Uuid,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub amount_cents: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub reference_id: Option<Uuid>,
    pub escrow_release_date: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// NewEscrow
///
/// A validated escrow order; the repository debits the payer and writes the hold row.
#[derive(Debug, Clone)]
pub struct NewEscrow {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub amount_cents: i64,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub description: Option<String>,
    pub release_date: DateTime<Utc>,
}

// --- Request Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AmountRequest {
    #[schema(example = 10000)]
    pub amount_cents: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EscrowRequest {
    pub to_user_id: Uuid,
    pub amount_cents: i64,
    pub job_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub description: Option<String>,
}

// --- Responses ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct WalletMovement {
    pub wallet: Wallet,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EscrowResponse {
    pub transaction: Transaction,
    pub escrow_release_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReleaseResponse {
    pub escrow: Transaction,
    pub release: Transaction,
}

// --- Listing & Filtering ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSort {
    #[default]
    CreatedAt,
    Amount,
}

impl TransactionSort {
    pub fn column(self) -> &'static str {
        match self {
            TransactionSort::CreatedAt => "created_at",
            TransactionSort::Amount => "amount_cents",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: Option<TransactionSort>,
    pub sort_order: Option<SortOrder>,
}

/// TransactionFilter
///
/// Always scoped to one participant: rows where the user is sender or recipient.
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    pub user_id: Uuid,
    pub kind: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort: TransactionSort,
    pub order: SortOrder,
}

impl TransactionQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }

    pub fn filter(&self, user_id: Uuid) -> TransactionFilter {
        TransactionFilter {
            user_id,
            kind: self.kind,
            status: self.status,
            date_from: self.date_from,
            date_to: self.date_to,
            sort: self.sort_by.unwrap_or_default(),
            order: self.sort_order.unwrap_or_default(),
        }
    }
}
