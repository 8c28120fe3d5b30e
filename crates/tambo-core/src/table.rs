//! # Table Module
//!
//! Dining tables (mesas) and their pending order (preventa).
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Table:   Free ──open──► Occupied ──bill──► Billing                   │
//! │              ▲               ▲  │               │                       │
//! │              │               └──┼───reopen──────┘                       │
//! │              │                  │                                       │
//! │              └──── cancel / checkout (from Occupied or Billing)         │
//! │                                                                         │
//! │   Order:   Open ◄──► Billing ──► Closed                                 │
//! │              └─────────┴───────► Cancelled                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The table status is always derived from its active order, see
//! [`table_status_for`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::TableOrderItem;
use crate::validation::validate_quantity;
use crate::{MAX_LINES, MAX_LINE_QUANTITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Free,
    Occupied,
    Billing,
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableStatus::Free => f.write_str("free"),
            TableStatus::Occupied => f.write_str("occupied"),
            TableStatus::Billing => f.write_str("billing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TableOrderStatus {
    Open,
    Billing,
    Closed,
    Cancelled,
}

impl TableOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableOrderStatus::Open => "open",
            TableOrderStatus::Billing => "billing",
            TableOrderStatus::Closed => "closed",
            TableOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TableOrderStatus::Open | TableOrderStatus::Billing)
    }

    pub fn can_transition_to(&self, next: TableOrderStatus) -> bool {
        use TableOrderStatus::*;
        matches!(
            (self, next),
            (Open, Billing) | (Billing, Open) | (Open | Billing, Closed) | (Open | Billing, Cancelled)
        )
    }

    /// Checked transition.
    pub fn transition(self, next: TableOrderStatus) -> CoreResult<TableOrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::transition("table order", self, next))
        }
    }
}

impl std::fmt::Display for TableOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status a table shows while its order is in `status`.
pub fn table_status_for(status: TableOrderStatus) -> TableStatus {
    match status {
        TableOrderStatus::Open => TableStatus::Occupied,
        TableOrderStatus::Billing => TableStatus::Billing,
        TableOrderStatus::Closed | TableOrderStatus::Cancelled => TableStatus::Free,
    }
}

/// A table can be opened, or receive a transferred order, only when free.
pub fn ensure_free(status: TableStatus) -> CoreResult<()> {
    if status != TableStatus::Free {
        return Err(CoreError::state("table", status, "the table is not free"));
    }
    Ok(())
}

/// Items can only change while the order is open (not waiting for the bill).
pub fn ensure_editable(status: TableOrderStatus) -> CoreResult<()> {
    if status != TableOrderStatus::Open {
        return Err(CoreError::state(
            "table order",
            status,
            "reopen the order to change its items",
        ));
    }
    Ok(())
}

// =============================================================================
// Items
// =============================================================================

/// An item a waiter wants to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub note: Option<String>,
}

/// What adding an item does to the stored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChange {
    Insert(DraftItem),
    /// Same product and same note already present: bump its quantity.
    Merge { item_id: String, quantity: i64 },
}

/// Blank notes are treated as no note.
pub fn normalize_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Decides whether `item` merges into an existing line or becomes a new one.
pub fn plan_add_item(existing: &[TableOrderItem], mut item: DraftItem) -> CoreResult<ItemChange> {
    validate_quantity(item.quantity)?;
    item.note = normalize_note(item.note.as_deref());

    let same = existing
        .iter()
        .find(|e| e.product_id == item.product_id && e.note == item.note);

    if let Some(line) = same {
        let quantity = line.quantity + item.quantity;
        if quantity > MAX_LINE_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_LINE_QUANTITY,
            }
            .into());
        }
        return Ok(ItemChange::Merge {
            item_id: line.id.clone(),
            quantity,
        });
    }

    if existing.len() >= MAX_LINES {
        return Err(CoreError::TooManyLines { max: MAX_LINES });
    }

    Ok(ItemChange::Insert(item))
}

/// Sum of the order's lines.
pub fn order_total(items: &[TableOrderItem]) -> Money {
    items
        .iter()
        .map(|i| Money::from_cents(i.unit_price_cents) * i.quantity)
        .sum()
}

/// The bill can only be requested for an order with items.
pub fn ensure_billable(items: &[TableOrderItem]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(CoreError::state(
            "table order",
            TableOrderStatus::Open,
            "the order has no items",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(id: &str, product: &str, qty: i64, note: Option<&str>) -> TableOrderItem {
        TableOrderItem {
            id: id.to_string(),
            table_order_id: "o1".to_string(),
            product_id: product.to_string(),
            name_snapshot: product.to_string(),
            unit_price_cents: 1500,
            quantity: qty,
            note: note.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn draft(product: &str, qty: i64, note: Option<&str>) -> DraftItem {
        DraftItem {
            product_id: product.to_string(),
            name: product.to_string(),
            unit_price: Money::from_cents(1500),
            quantity: qty,
            note: note.map(str::to_string),
        }
    }

    #[test]
    fn test_order_transitions() {
        use TableOrderStatus::*;
        assert_eq!(Open.transition(Billing).unwrap(), Billing);
        assert_eq!(Billing.transition(Open).unwrap(), Open);
        assert!(Billing.transition(Closed).is_ok());
        assert!(Open.transition(Cancelled).is_ok());
        assert!(Closed.transition(Open).is_err());
        assert!(Cancelled.transition(Billing).is_err());
    }

    #[test]
    fn test_table_status_follows_order() {
        assert_eq!(table_status_for(TableOrderStatus::Open), TableStatus::Occupied);
        assert_eq!(table_status_for(TableOrderStatus::Billing), TableStatus::Billing);
        assert_eq!(table_status_for(TableOrderStatus::Closed), TableStatus::Free);
    }

    #[test]
    fn test_add_merges_same_product_and_note() {
        let existing = vec![
            stored("i1", "ceviche", 1, Some("sin cebolla")),
            stored("i2", "ceviche", 2, None),
        ];

        let change = plan_add_item(&existing, draft("ceviche", 1, Some(" sin cebolla "))).unwrap();
        assert_eq!(
            change,
            ItemChange::Merge {
                item_id: "i1".to_string(),
                quantity: 2
            }
        );

        let change = plan_add_item(&existing, draft("ceviche", 3, Some("  "))).unwrap();
        assert_eq!(
            change,
            ItemChange::Merge {
                item_id: "i2".to_string(),
                quantity: 5
            }
        );

        let change = plan_add_item(&existing, draft("ceviche", 1, Some("picante"))).unwrap();
        assert!(matches!(change, ItemChange::Insert(_)));
    }

    #[test]
    fn test_add_rejects_bad_quantity() {
        assert!(plan_add_item(&[], draft("x", 0, None)).is_err());
        let existing = vec![stored("i1", "x", MAX_LINE_QUANTITY, None)];
        assert!(plan_add_item(&existing, draft("x", 1, None)).is_err());
    }

    #[test]
    fn test_guards() {
        assert!(ensure_free(TableStatus::Free).is_ok());
        assert!(ensure_free(TableStatus::Occupied).is_err());
        assert!(ensure_editable(TableOrderStatus::Open).is_ok());
        assert!(ensure_editable(TableOrderStatus::Billing).is_err());
        assert!(ensure_billable(&[]).is_err());
    }

    #[test]
    fn test_order_total() {
        let items = vec![stored("a", "x", 2, None), stored("b", "y", 1, None)];
        assert_eq!(order_total(&items).cents(), 4500);
    }
}
