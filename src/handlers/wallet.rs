use axum::{extract::State, response::Response};
use chrono::Utc;
use uuid::Uuid;

use super::{ensure_owner, job_owner, shift_owner};
use crate::{
    AppState,
    auth::AuthUser,
    domain,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    ledger,
    models::{
        AmountRequest, EscrowRequest, EscrowResponse, NewEscrow, ReleaseResponse, Role,
        Transaction, TransactionQuery, Wallet, WalletMovement,
    },
    pagination::{PaginatedResponse, created, ok},
    repository::{UserRepository, WalletRepository},
};

/// get_wallet
///
/// [Authenticated Route] The caller's wallet, created on first access.
#[utoipa::path(
    get,
    path = "/api/wallet",
    responses((status = 200, description = "Wallet", body = Wallet))
)]
pub async fn get_wallet(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    let wallet = state.repo.get_or_create_wallet(user.id).await?;
    Ok(ok("Wallet retrieved successfully", wallet))
}

/// list_transactions
///
/// [Authenticated Route] Ledger rows where the caller is sender or recipient.
#[utoipa::path(
    get,
    path = "/api/wallet/transactions",
    params(TransactionQuery),
    responses((status = 200, description = "Paginated transactions", body = [Transaction]))
)]
pub async fn list_transactions(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> AppResult<PaginatedResponse<Transaction>> {
    let page = query.page();
    let (rows, total) = state.repo.list_transactions(&query.filter(user.id), page).await?;
    Ok(PaginatedResponse::new("Transactions retrieved successfully", rows, page, total))
}

#[utoipa::path(
    post,
    path = "/api/wallet/add-funds",
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Funds added", body = WalletMovement),
        (status = 400, description = "Amount must be positive")
    )
)]
pub async fn add_funds(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AmountRequest>,
) -> AppResult<Response> {
    ledger::require_positive(payload.amount_cents)?;
    let movement = state
        .repo
        .deposit(user.id, payload.amount_cents, domain::non_empty(payload.description))
        .await?;
    tracing::info!(user_id = %user.id, amount_cents = payload.amount_cents, "funds added");
    Ok(ok("Funds added successfully", movement))
}

/// withdraw
///
/// [Authenticated Route] Debits the wallet immediately; the withdrawal row stays
/// `pending` until paid out.
#[utoipa::path(
    post,
    path = "/api/wallet/withdraw",
    request_body = AmountRequest,
    responses(
        (status = 200, description = "Withdrawal requested", body = WalletMovement),
        (status = 400, description = "Invalid amount or insufficient balance"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn withdraw(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AmountRequest>,
) -> AppResult<Response> {
    ledger::require_positive(payload.amount_cents)?;
    let movement = state
        .repo
        .withdraw(user.id, payload.amount_cents, domain::non_empty(payload.description))
        .await?;
    tracing::info!(user_id = %user.id, amount_cents = payload.amount_cents, "withdrawal requested");
    Ok(ok("Withdrawal request submitted successfully", movement))
}

/// create_escrow
///
/// [Authenticated Route] An agency moves funds from its wallet into a hold payable to
/// another user. The hold becomes releasable after the configured number of days.
#[utoipa::path(
    post,
    path = "/api/wallet/escrow",
    request_body = EscrowRequest,
    responses(
        (status = 201, description = "Escrow created", body = EscrowResponse),
        (status = 400, description = "Invalid amount, self-payment or insufficient balance"),
        (status = 403, description = "Job or shift belongs to another company"),
        (status = 404, description = "Recipient, job, shift or wallet not found")
    )
)]
pub async fn create_escrow(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<EscrowRequest>,
) -> AppResult<Response> {
    user.require(&[Role::Agency])?;
    ledger::require_positive(payload.amount_cents)?;

    if payload.to_user_id == user.id {
        return Err(AppError::validation("Cannot create an escrow payable to yourself"));
    }
    state
        .repo
        .get_user(payload.to_user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipient"))?;
    if let Some(job_id) = payload.job_id {
        ensure_owner(user, job_owner(&state.repo, job_id).await?, "job")?;
    }
    if let Some(shift_id) = payload.shift_id {
        ensure_owner(user, shift_owner(&state.repo, shift_id).await?, "shift")?;
    }

    let release_date = ledger::escrow_release_date(Utc::now(), state.config.escrow_hold_days);
    let transaction = state
        .repo
        .create_escrow(NewEscrow {
            from_user_id: user.id,
            to_user_id: payload.to_user_id,
            amount_cents: payload.amount_cents,
            job_id: payload.job_id,
            shift_id: payload.shift_id,
            description: domain::non_empty(payload.description),
            release_date,
        })
        .await?;

    tracing::info!(
        transaction_id = %transaction.id,
        from = %user.id,
        to = %payload.to_user_id,
        amount_cents = payload.amount_cents,
        "escrow created"
    );
    Ok(created(
        "Escrow created successfully",
        EscrowResponse {
            transaction,
            escrow_release_date: release_date,
        },
    ))
}

/// release_escrow
///
/// [Admin Route] Pays a matured escrow out to its recipient. A given escrow can be
/// released once; later attempts get 409.
#[utoipa::path(
    post,
    path = "/api/wallet/escrow/{transaction_id}/release",
    params(("transaction_id" = Uuid, Path, description = "Escrow transaction ID")),
    responses(
        (status = 200, description = "Escrow released", body = ReleaseResponse),
        (status = 400, description = "Not an escrow or still on hold"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Already released")
    )
)]
pub async fn release_escrow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<Response> {
    user.require(&[Role::Admin])?;
    let released = state.repo.release_escrow(transaction_id, Utc::now()).await?;
    Ok(ok("Escrow released successfully", released))
}
