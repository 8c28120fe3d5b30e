//! # Inventory Module
//!
//! Stock levels and kardex movements valued at weighted average cost.
//!
//! ## Weighted Average Cost
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock 10 u @ S/ 2.00          purchase 5 u @ S/ 2.60                   │
//! │                                                                         │
//! │  new avg = (10 × 2.00 + 5 × 2.60) / 15 = 2.20                           │
//! │                                                                         │
//! │  Entries (purchase, void, adjustment in, transfer in) re-average.      │
//! │  Exits (sale, adjustment out, transfer out, waste) leave at the        │
//! │  current average and never change it.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every application returns the [`KardexLine`] to persist alongside the new
//! [`StockLevel`], so the kardex always carries the running balance.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::validate_quantity;

/// Kind of kardex movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Initial,
    Purchase,
    Sale,
    SaleVoid,
    AdjustmentIn,
    AdjustmentOut,
    TransferIn,
    TransferOut,
    Waste,
}

impl MovementKind {
    /// Whether the movement adds stock.
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            MovementKind::Initial
                | MovementKind::Purchase
                | MovementKind::SaleVoid
                | MovementKind::AdjustmentIn
                | MovementKind::TransferIn
        )
    }
}

/// Quantity on hand and its average unit cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub quantity: i64,
    pub average_cost: Money,
}

/// A kardex row ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KardexLine {
    pub movement: MovementKind,
    pub quantity: i64,
    pub unit_cost: Money,
    pub total_cost: Money,
    pub balance: StockLevel,
}

impl StockLevel {
    pub fn new(quantity: i64, average_cost: Money) -> Self {
        StockLevel {
            quantity,
            average_cost,
        }
    }

    /// Stock value at average cost.
    pub fn value(&self) -> Money {
        self.average_cost * self.quantity
    }

    /// Adds `quantity` units at `unit_cost`.
    pub fn receive(
        &self,
        movement: MovementKind,
        quantity: i64,
        unit_cost: Money,
    ) -> CoreResult<(StockLevel, KardexLine)> {
        if !movement.is_entry() {
            return Err(ValidationError::invalid_format("movement", "not an entry").into());
        }
        validate_quantity(quantity)?;
        if unit_cost.is_negative() {
            return Err(ValidationError::must_be_positive("unit_cost").into());
        }

        let new_quantity = self.quantity + quantity;

        // A negative or empty balance carries no meaningful cost to blend.
        let average_cost = if self.quantity <= 0 {
            unit_cost
        } else {
            (self.value() + unit_cost * quantity).divide(new_quantity)
        };

        let balance = StockLevel::new(new_quantity, average_cost);
        Ok((
            balance,
            KardexLine {
                movement,
                quantity,
                unit_cost,
                total_cost: unit_cost * quantity,
                balance,
            },
        ))
    }

    /// Removes `quantity` units at the current average cost.
    ///
    /// ## Errors
    /// `InsufficientStock` when the result would be negative and
    /// `allow_negative` is false.
    pub fn issue(
        &self,
        movement: MovementKind,
        quantity: i64,
        sku: &str,
        allow_negative: bool,
    ) -> CoreResult<(StockLevel, KardexLine)> {
        if movement.is_entry() {
            return Err(ValidationError::invalid_format("movement", "not an exit").into());
        }
        validate_quantity(quantity)?;

        if !allow_negative && quantity > self.quantity {
            return Err(CoreError::InsufficientStock {
                sku: sku.to_string(),
                available: self.quantity,
                requested: quantity,
            });
        }

        let balance = StockLevel::new(self.quantity - quantity, self.average_cost);
        Ok((
            balance,
            KardexLine {
                movement,
                quantity,
                unit_cost: self.average_cost,
                total_cost: self.average_cost * quantity,
                balance,
            },
        ))
    }

    /// The adjustment that brings the level to a physical count.
    ///
    /// Returns `None` when the count matches.
    pub fn adjustment_to(&self, counted: i64) -> Option<(MovementKind, i64)> {
        match counted - self.quantity {
            0 => None,
            diff if diff > 0 => Some((MovementKind::AdjustmentIn, diff)),
            diff => Some((MovementKind::AdjustmentOut, -diff)),
        }
    }

    /// Applies the adjustment towards `counted`. Counted stock is never
    /// negative, so an exit here is always allowed.
    pub fn adjust_to(&self, counted: i64) -> CoreResult<Option<(StockLevel, KardexLine)>> {
        if counted < 0 {
            return Err(ValidationError::OutOfRange {
                field: "counted".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        match self.adjustment_to(counted) {
            None => Ok(None),
            Some((MovementKind::AdjustmentIn, qty)) => self
                .receive(MovementKind::AdjustmentIn, qty, self.average_cost)
                .map(Some),
            Some((kind, qty)) => self.issue(kind, qty, "", true).map(Some),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn level(q: i64, avg: i64) -> StockLevel {
        StockLevel::new(q, Money::from_cents(avg))
    }

    #[test]
    fn test_receive_reaverages() {
        let (next, line) = level(10, 200)
            .receive(MovementKind::Purchase, 5, Money::from_cents(260))
            .unwrap();
        assert_eq!(next.quantity, 15);
        assert_eq!(next.average_cost.cents(), 220);
        assert_eq!(line.total_cost.cents(), 1300);
        assert_eq!(line.balance, next);
    }

    #[test]
    fn test_receive_rounds_half_up() {
        // (3 × 100 + 1 × 101) / 4 = 100.25 → 100; (1 × 100 + 1 × 101) / 2 = 100.5 → 101
        let (a, _) = level(3, 100)
            .receive(MovementKind::Purchase, 1, Money::from_cents(101))
            .unwrap();
        assert_eq!(a.average_cost.cents(), 100);
        let (b, _) = level(1, 100)
            .receive(MovementKind::Purchase, 1, Money::from_cents(101))
            .unwrap();
        assert_eq!(b.average_cost.cents(), 101);
    }

    #[test]
    fn test_receive_into_empty_takes_entry_cost() {
        let (next, _) = StockLevel::default()
            .receive(MovementKind::Initial, 8, Money::from_cents(350))
            .unwrap();
        assert_eq!(next, level(8, 350));

        let (next, _) = level(-2, 900)
            .receive(MovementKind::Purchase, 5, Money::from_cents(300))
            .unwrap();
        assert_eq!(next, level(3, 300));
    }

    #[test]
    fn test_issue_keeps_average() {
        let (next, line) = level(15, 220).issue(MovementKind::Sale, 4, "X", false).unwrap();
        assert_eq!(next, level(11, 220));
        assert_eq!(line.unit_cost.cents(), 220);
        assert_eq!(line.total_cost.cents(), 880);
    }

    #[test]
    fn test_issue_insufficient_stock() {
        let err = level(3, 100)
            .issue(MovementKind::Sale, 5, "INCA-500", false)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 3, requested: 5, .. }
        ));

        let (next, _) = level(3, 100).issue(MovementKind::Sale, 5, "INCA-500", true).unwrap();
        assert_eq!(next.quantity, -2);
    }

    #[test]
    fn test_direction_is_checked() {
        assert!(level(1, 1).receive(MovementKind::Sale, 1, Money::zero()).is_err());
        assert!(level(1, 1).issue(MovementKind::Purchase, 1, "X", false).is_err());
        assert!(level(1, 1).receive(MovementKind::Purchase, 0, Money::zero()).is_err());
    }

    #[test]
    fn test_adjust_to_count() {
        assert_eq!(level(10, 100).adjustment_to(10), None);
        assert_eq!(
            level(10, 100).adjustment_to(12),
            Some((MovementKind::AdjustmentIn, 2))
        );

        let (next, line) = level(10, 100).adjust_to(7).unwrap().unwrap();
        assert_eq!(line.movement, MovementKind::AdjustmentOut);
        assert_eq!(line.quantity, 3);
        assert_eq!(next, level(7, 100));

        let (next, _) = level(-4, 100).adjust_to(0).unwrap().unwrap();
        assert_eq!(next.quantity, 0);

        assert!(level(1, 1).adjust_to(-1).is_err());
    }
}
