//! # Cash Module
//!
//! Cash register (caja) sessions: what a session should hold at closing and
//! how far the count is from it.
//!
//! ```text
//! expected = opening
//!          + cash applied to completed sales   (already net of change)
//!          + manual incomes
//!          − manual expenses
//!
//! variance = counted − expected     (negative = faltante, positive = sobrante)
//! ```
//! Voided sales drop out of the figures because only completed sales are fed
//! in.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::sale::PaymentMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashSessionStatus {
    Open,
    Closed,
}

impl std::fmt::Display for CashSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CashSessionStatus::Open => f.write_str("open"),
            CashSessionStatus::Closed => f.write_str("closed"),
        }
    }
}

/// A manual movement of cash in or out of the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashMovementKind {
    Income,
    Expense,
}

/// Sales and movements must reference an open session.
pub fn ensure_open(status: CashSessionStatus) -> CoreResult<()> {
    match status {
        CashSessionStatus::Open => Ok(()),
        CashSessionStatus::Closed => Err(CoreError::state(
            "cash session",
            status,
            "the session is already closed",
        )),
    }
}

/// Raw figures of a session, as loaded from the database.
#[derive(Debug, Clone, Default)]
pub struct SessionActivity {
    pub opening: Money,
    /// Applied amount per payment row of completed sales.
    pub payments: Vec<(PaymentMethod, Money)>,
    pub incomes: Money,
    pub expenses: Money,
    pub sales_count: i64,
    pub voided_count: i64,
}

/// Collected amount of one payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub amount: Money,
}

/// The arqueo of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashSummary {
    pub opening: Money,
    pub by_method: Vec<MethodTotal>,
    pub cash_sales: Money,
    pub incomes: Money,
    pub expenses: Money,
    pub expected: Money,
    pub sales_count: i64,
    pub voided_count: i64,
}

impl CashSummary {
    pub fn from_activity(activity: &SessionActivity) -> Self {
        let by_method: Vec<MethodTotal> = PaymentMethod::ALL
            .iter()
            .map(|method| MethodTotal {
                method: *method,
                amount: activity
                    .payments
                    .iter()
                    .filter(|(m, _)| m == method)
                    .map(|(_, amount)| *amount)
                    .sum(),
            })
            .collect();

        let cash_sales = by_method
            .iter()
            .find(|t| t.method.is_cash())
            .map(|t| t.amount)
            .unwrap_or_default();

        CashSummary {
            opening: activity.opening,
            cash_sales,
            incomes: activity.incomes,
            expenses: activity.expenses,
            expected: activity.opening + cash_sales + activity.incomes - activity.expenses,
            sales_count: activity.sales_count,
            voided_count: activity.voided_count,
            by_method,
        }
    }

    /// `counted − expected`.
    pub fn variance(&self, counted: Money) -> Money {
        counted - self.expected
    }

    /// Rejects an expense larger than the cash in the drawer.
    pub fn check_expense(&self, amount: Money) -> CoreResult<()> {
        if amount > self.expected {
            return Err(CoreError::state(
                "cash session",
                CashSessionStatus::Open,
                format!("expense {} exceeds the cash on hand {}", amount, self.expected),
            ));
        }
        Ok(())
    }
}
