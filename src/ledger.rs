//! Wallet arithmetic and escrow rules.
//!
//! Repositories call these while holding the wallet lock so that the balance check and
//! the write happen against the same row version.

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{Transaction, TransactionStatus, TransactionType},
};

pub fn require_positive(amount_cents: i64) -> AppResult<()> {
    if amount_cents <= 0 {
        return Err(AppError::validation("Amount must be greater than 0"));
    }
    Ok(())
}

pub fn credit(balance_cents: i64, amount_cents: i64) -> AppResult<i64> {
    require_positive(amount_cents)?;
    balance_cents
        .checked_add(amount_cents)
        .ok_or_else(|| AppError::validation("Balance limit exceeded"))
}

pub fn debit(balance_cents: i64, amount_cents: i64) -> AppResult<i64> {
    require_positive(amount_cents)?;
    if amount_cents > balance_cents {
        return Err(AppError::validation("Insufficient balance"));
    }
    Ok(balance_cents - amount_cents)
}

pub fn escrow_release_date(now: DateTime<Utc>, hold_days: i64) -> DateTime<Utc> {
    now + Duration::days(hold_days)
}

/// Checks that `escrow` may be settled now. `already_released` is whether a release row
/// referencing it exists.
pub fn check_releasable(escrow: &Transaction, already_released: bool, now: DateTime<Utc>) -> AppResult<()> {
    if escrow.kind != TransactionType::Escrow {
        return Err(AppError::validation("Transaction is not an escrow"));
    }
    if escrow.status != TransactionStatus::Success {
        return Err(AppError::validation("Escrow is not in a releasable state"));
    }
    if already_released {
        return Err(AppError::Conflict("Escrow has already been released".into()));
    }
    match escrow.escrow_release_date {
        Some(release_at) if release_at > now => {
            Err(AppError::validation("Escrow hold period has not elapsed"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn escrow(release_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id: Uuid::from_u128(1),
            from_user_id: Some(Uuid::from_u128(2)),
            to_user_id: Some(Uuid::from_u128(3)),
            job_id: None,
            shift_id: None,
            amount_cents: 5_000,
            kind: TransactionType::Escrow,
            status: TransactionStatus::Success,
            description: None,
            reference_id: None,
            escrow_release_date: Some(release_at),
            processed_at: None,
            failure_reason: None,
            created_at: release_at - Duration::days(5),
        }
    }

    #[test]
    fn debit_refuses_overdraft() {
        assert_eq!(debit(1_000, 400).unwrap(), 600);
        assert_eq!(debit(1_000, 1_000).unwrap(), 0);
        assert!(debit(1_000, 1_001).is_err());
        assert!(debit(1_000, 0).is_err());
    }

    #[test]
    fn credit_rejects_non_positive_and_overflow() {
        assert_eq!(credit(0, 250).unwrap(), 250);
        assert!(credit(0, -5).is_err());
        assert!(credit(i64::MAX, 1).is_err());
    }

    #[test]
    fn release_waits_for_the_hold_period() {
        let now = Utc::now();
        assert_eq!(escrow_release_date(now, 5), now + Duration::days(5));

        let held = escrow(now + Duration::hours(1));
        assert_eq!(
            check_releasable(&held, false, now).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );

        let due = escrow(now - Duration::minutes(1));
        assert!(check_releasable(&due, false, now).is_ok());
    }

    #[test]
    fn second_release_conflicts() {
        let now = Utc::now();
        let due = escrow(now - Duration::days(1));
        assert_eq!(
            check_releasable(&due, true, now).unwrap_err().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn only_successful_escrow_rows_release() {
        let now = Utc::now();
        let mut deposit = escrow(now - Duration::days(1));
        deposit.kind = TransactionType::Deposit;
        assert!(check_releasable(&deposit, false, now).is_err());

        let mut cancelled = escrow(now - Duration::days(1));
        cancelled.status = TransactionStatus::Cancelled;
        assert!(check_releasable(&cancelled, false, now).is_err());
    }
}
