use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PostgresRepository, conflict_on_unique, push_order_and_page};
use crate::{
    error::{AppError, AppResult},
    ledger,
    models::{
        NewEscrow, ReleaseResponse, Transaction, TransactionFilter, TransactionStatus,
        TransactionType, Wallet, WalletMovement,
    },
    pagination::Page,
    repository::WalletRepository,
};

const WALLET_COLUMNS: &str = "id, user_id, balance_cents, currency, is_active, last_updated, created_at";

const TRANSACTION_COLUMNS: &str = "id, from_user_id, to_user_id, job_id, shift_id, amount_cents, type, status, \
    description, reference_id, escrow_release_date, processed_at, failure_reason, created_at";

/// A ledger row about to be written.
struct Entry {
    from_user_id: Option<Uuid>,
    to_user_id: Option<Uuid>,
    job_id: Option<Uuid>,
    shift_id: Option<Uuid>,
    amount_cents: i64,
    kind: TransactionType,
    status: TransactionStatus,
    description: Option<String>,
    reference_id: Option<Uuid>,
    escrow_release_date: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn new(kind: TransactionType, status: TransactionStatus, amount_cents: i64) -> Self {
        Entry {
            from_user_id: None,
            to_user_id: None,
            job_id: None,
            shift_id: None,
            amount_cents,
            kind,
            status,
            description: None,
            reference_id: None,
            escrow_release_date: None,
            processed_at: None,
        }
    }
}

async fn insert_entry(conn: &mut PgConnection, entry: Entry) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(&format!(
        "INSERT INTO transactions \
             (id, from_user_id, to_user_id, job_id, shift_id, amount_cents, type, status, description, \
              reference_id, escrow_release_date, processed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(entry.from_user_id)
    .bind(entry.to_user_id)
    .bind(entry.job_id)
    .bind(entry.shift_id)
    .bind(entry.amount_cents)
    .bind(entry.kind)
    .bind(entry.status)
    .bind(entry.description)
    .bind(entry.reference_id)
    .bind(entry.escrow_release_date)
    .bind(entry.processed_at)
    .fetch_one(conn)
    .await
}

async fn lock_wallet(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<Wallet>, sqlx::Error> {
    sqlx::query_as::<_, Wallet>(&format!(
        "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

async fn ensure_wallet(conn: &mut PgConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO wallets (id, user_id, balance_cents, currency) VALUES ($1, $2, 0, 'USD') \
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn set_balance(conn: &mut PgConnection, wallet_id: Uuid, balance_cents: i64) -> Result<Wallet, sqlx::Error> {
    sqlx::query_as::<_, Wallet>(&format!(
        "UPDATE wallets SET balance_cents = $2, last_updated = NOW() WHERE id = $1 RETURNING {WALLET_COLUMNS}"
    ))
    .bind(wallet_id)
    .bind(balance_cents)
    .fetch_one(conn)
    .await
}

fn push_transaction_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    builder
        .push(" WHERE (from_user_id = ")
        .push_bind(filter.user_id)
        .push(" OR to_user_id = ")
        .push_bind(filter.user_id)
        .push(")");
    if let Some(kind) = filter.kind {
        builder.push(" AND type = ").push_bind(kind);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.date_from {
        builder.push(" AND created_at::date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        builder.push(" AND created_at::date <= ").push_bind(to);
    }
}

#[async_trait]
impl WalletRepository for PostgresRepository {
    async fn get_or_create_wallet(&self, user_id: Uuid) -> AppResult<Wallet> {
        let mut conn = self.pool.acquire().await?;
        ensure_wallet(&mut conn, user_id).await?;
        let wallet = sqlx::query_as::<_, Wallet>(&format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"))
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(wallet)
    }

    async fn get_wallet(&self, user_id: Uuid) -> AppResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(wallet)
    }

    async fn list_transactions(&self, filter: &TransactionFilter, page: Page) -> AppResult<(Vec<Transaction>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_transaction_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {TRANSACTION_COLUMNS} FROM transactions"));
        push_transaction_filters(&mut builder, filter);
        push_order_and_page(&mut builder, filter.sort.column(), filter.order.sql(), page);
        let rows = builder.build_query_as::<Transaction>().fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    async fn get_transaction(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn deposit(&self, user_id: Uuid, amount_cents: i64, description: Option<String>) -> AppResult<WalletMovement> {
        let mut tx = self.pool.begin().await?;

        ensure_wallet(&mut tx, user_id).await?;
        let wallet = lock_wallet(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Wallet"))?;
        let balance = ledger::credit(wallet.balance_cents, amount_cents)?;
        let wallet = set_balance(&mut tx, wallet.id, balance).await?;

        let transaction = insert_entry(
            &mut tx,
            Entry {
                to_user_id: Some(user_id),
                description: Some(description.unwrap_or_else(|| "Wallet deposit".to_string())),
                processed_at: Some(Utc::now()),
                ..Entry::new(TransactionType::Deposit, TransactionStatus::Success, amount_cents)
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(%user_id, amount_cents, "wallet deposit");
        Ok(WalletMovement { wallet, transaction })
    }

    async fn withdraw(&self, user_id: Uuid, amount_cents: i64, description: Option<String>) -> AppResult<WalletMovement> {
        let mut tx = self.pool.begin().await?;

        let wallet = lock_wallet(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Wallet"))?;
        let balance = ledger::debit(wallet.balance_cents, amount_cents)?;
        let wallet = set_balance(&mut tx, wallet.id, balance).await?;

        let transaction = insert_entry(
            &mut tx,
            Entry {
                from_user_id: Some(user_id),
                description: Some(description.unwrap_or_else(|| "Wallet withdrawal".to_string())),
                ..Entry::new(TransactionType::Withdrawal, TransactionStatus::Pending, amount_cents)
            },
        )
        .await?;

        tx.commit().await?;
        tracing::info!(%user_id, amount_cents, "wallet withdrawal requested");
        Ok(WalletMovement { wallet, transaction })
    }

    async fn create_escrow(&self, escrow: NewEscrow) -> AppResult<Transaction> {
        let mut tx = self.pool.begin().await?;

        let payer = lock_wallet(&mut tx, escrow.from_user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Wallet"))?;
        let balance = ledger::debit(payer.balance_cents, escrow.amount_cents)?;
        set_balance(&mut tx, payer.id, balance).await?;

        let transaction = insert_entry(
            &mut tx,
            Entry {
                from_user_id: Some(escrow.from_user_id),
                to_user_id: Some(escrow.to_user_id),
                job_id: escrow.job_id,
                shift_id: escrow.shift_id,
                description: Some(escrow.description.unwrap_or_else(|| "Escrow payment".to_string())),
                escrow_release_date: Some(escrow.release_date),
                processed_at: Some(Utc::now()),
                ..Entry::new(TransactionType::Escrow, TransactionStatus::Success, escrow.amount_cents)
            },
        )
        .await?;

        ensure_wallet(&mut tx, escrow.to_user_id).await?;

        tx.commit().await?;
        tracing::info!(escrow_id = %transaction.id, amount_cents = escrow.amount_cents, "escrow created");
        Ok(transaction)
    }

    /// release_escrow
    ///
    /// Locks the escrow row, so concurrent releases serialize; the partial unique index on
    /// `reference_id` backs the existence check.
    async fn release_escrow(&self, escrow_id: Uuid, now: DateTime<Utc>) -> AppResult<ReleaseResponse> {
        let mut tx = self.pool.begin().await?;

        let escrow = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(escrow_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Transaction"))?;

        let released: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE type = 'release' AND reference_id = $1)",
        )
        .bind(escrow_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Err(e) = ledger::check_releasable(&escrow, released, now) {
            tracing::warn!(%escrow_id, "escrow release refused: {}", e);
            return Err(e);
        }

        let recipient = escrow
            .to_user_id
            .ok_or_else(|| AppError::Internal(format!("escrow {escrow_id} has no recipient")))?;

        ensure_wallet(&mut tx, recipient).await?;
        let wallet = lock_wallet(&mut tx, recipient)
            .await?
            .ok_or_else(|| AppError::not_found("Wallet"))?;
        let balance = ledger::credit(wallet.balance_cents, escrow.amount_cents)?;
        set_balance(&mut tx, wallet.id, balance).await?;

        let release = insert_entry(
            &mut tx,
            Entry {
                to_user_id: Some(recipient),
                job_id: escrow.job_id,
                shift_id: escrow.shift_id,
                description: Some("Escrow release".to_string()),
                reference_id: Some(escrow.id),
                processed_at: Some(now),
                ..Entry::new(TransactionType::Release, TransactionStatus::Success, escrow.amount_cents)
            },
        )
        .await
        .map_err(|e| conflict_on_unique(e, "Escrow has already been released"))?;

        tx.commit().await?;
        tracing::info!(%escrow_id, release_id = %release.id, "escrow released");
        Ok(ReleaseResponse { escrow, release })
    }
}
