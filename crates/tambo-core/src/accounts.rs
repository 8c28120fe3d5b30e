//! # Accounts Module
//!
//! Receivables (cuentas por cobrar) and payables (cuentas por pagar).
//!
//! ```text
//! Pending ──partial payment──► Partial ──rest──► Paid
//!    │                                   ▲
//!    └──────────full payment─────────────┘
//! Pending ──sale voided──► Cancelled
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Receivable,
    Payable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl AccountStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, AccountStatus::Paid | AccountStatus::Cancelled)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Partial => "partial",
            AccountStatus::Paid => "paid",
            AccountStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Balance and status after a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub balance: Money,
    pub status: AccountStatus,
}

/// Applies a payment to an outstanding balance.
///
/// ## Errors
/// - amount not positive
/// - account already paid or cancelled
/// - `Overpayment` when the amount exceeds the balance
pub fn apply_payment(
    status: AccountStatus,
    balance: Money,
    amount: Money,
) -> CoreResult<BalanceChange> {
    if !amount.is_positive() {
        return Err(ValidationError::must_be_positive("amount").into());
    }

    if status.is_settled() {
        return Err(CoreError::state("account", status, "nothing is owed"));
    }

    if amount > balance {
        return Err(CoreError::Overpayment {
            amount: amount.cents(),
            balance: balance.cents(),
        });
    }

    let balance = balance - amount;
    Ok(BalanceChange {
        balance,
        status: if balance.is_zero() {
            AccountStatus::Paid
        } else {
            AccountStatus::Partial
        },
    })
}

/// A receivable can be dropped (sale voided) only before any collection.
pub fn ensure_cancellable(status: AccountStatus) -> CoreResult<()> {
    if status != AccountStatus::Pending {
        return Err(CoreError::state(
            "account",
            status,
            "payments were already applied",
        ));
    }
    Ok(())
}

/// Not settled and past its due date.
pub fn is_overdue(status: AccountStatus, due_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    !status.is_settled() && due_date.is_some_and(|d| d < today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_partial_then_full_payment() {
        let first = apply_payment(AccountStatus::Pending, m(10_000), m(4_000)).unwrap();
        assert_eq!(first.status, AccountStatus::Partial);
        assert_eq!(first.balance, m(6_000));

        let second = apply_payment(first.status, first.balance, m(6_000)).unwrap();
        assert_eq!(second.status, AccountStatus::Paid);
        assert!(second.balance.is_zero());
    }

    #[test]
    fn test_payment_errors() {
        assert!(matches!(
            apply_payment(AccountStatus::Partial, m(1_000), m(1_001)),
            Err(CoreError::Overpayment { amount: 1_001, balance: 1_000 })
        ));
        assert!(apply_payment(AccountStatus::Pending, m(1_000), m(0)).is_err());
        assert!(apply_payment(AccountStatus::Paid, m(0), m(1)).is_err());
        assert!(apply_payment(AccountStatus::Cancelled, m(1_000), m(1)).is_err());
    }

    #[test]
    fn test_overdue() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let past = NaiveDate::from_ymd_opt(2026, 10, 1);
        assert!(is_overdue(AccountStatus::Pending, past, today));
        assert!(is_overdue(AccountStatus::Partial, past, today));
        assert!(!is_overdue(AccountStatus::Paid, past, today));
        assert!(!is_overdue(AccountStatus::Pending, Some(today), today));
        assert!(!is_overdue(AccountStatus::Pending, None, today));
    }

    #[test]
    fn test_cancellable() {
        assert!(ensure_cancellable(AccountStatus::Pending).is_ok());
        assert!(ensure_cancellable(AccountStatus::Partial).is_err());
    }
}
