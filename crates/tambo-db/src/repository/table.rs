//! # Table Repository
//!
//! Dining tables and their pending order (preventa).
//!
//! ## Table / Order States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  table       Free ──open──► Occupied ──bill──► Billing                  │
//! │                ▲               ▲   │              │                     │
//! │                │               └───┼──reopen──────┘                     │
//! │                │                   │                                    │
//! │                └─────cancel / checkout / transfer away─────┘            │
//! │                                                                         │
//! │  order       Open ◄──► Billing ──► Closed (sale) | Cancelled            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table row mirrors its active order (`table_status_for`); both are
//! written in the same transaction. `idx_table_orders_one_active` keeps a
//! table from ever holding two active orders.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use tambo_core::table::{
    ensure_billable, ensure_editable, ensure_free, order_total, plan_add_item, table_status_for,
    DraftItem, ItemChange, TableOrderStatus, TableStatus,
};
use tambo_core::validation::{validate_name, validate_quantity};
use tambo_core::{
    CoreError, DiningTable, Money, TableOrder, TableOrderItem, TenantScope, ValidationError,
};

/// An active order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct TableOrderView {
    pub table: DiningTable,
    pub order: TableOrder,
    pub items: Vec<TableOrderItem>,
    pub total: Money,
}

#[derive(Debug, Clone)]
pub struct TableRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl TableRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        TableRepository { pool, scope }
    }

    pub async fn list(&self) -> DbResult<Vec<DiningTable>> {
        let tables = sqlx::query_as::<_, DiningTable>(&format!(
            "SELECT {TABLE_COLUMNS} FROM dining_tables \
             WHERE company_id = ?1 AND branch_id = ?2 AND is_active = 1 ORDER BY label"
        ))
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }

    pub async fn create(&self, label: &str, capacity: i64) -> DbResult<DiningTable> {
        validate_name("label", label)?;
        if !(1..=50).contains(&capacity) {
            return Err(ValidationError::OutOfRange {
                field: "capacity".to_string(),
                min: 1,
                max: 50,
            }
            .into());
        }

        let table = DiningTable {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            label: label.trim().to_string(),
            capacity,
            status: TableStatus::Free,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO dining_tables (id, company_id, branch_id, label, capacity, status, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&table.id)
        .bind(&table.company_id)
        .bind(&table.branch_id)
        .bind(&table.label)
        .bind(table.capacity)
        .bind(table.status)
        .bind(table.is_active)
        .bind(table.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("label", &table.label),
            other => other,
        })?;

        Ok(table)
    }

    /// Seats guests at a free table.
    pub async fn open(&self, table_id: &str, waiter_id: &str, guests: i64) -> DbResult<TableOrderView> {
        if guests < 1 {
            return Err(ValidationError::must_be_positive("guests").into());
        }

        let mut tx = self.pool.begin().await?;

        let table = find_table(&mut tx, &self.scope, table_id).await?;
        ensure_free(table.status)?;

        let order = TableOrder {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            table_id: table.id.clone(),
            waiter_id: waiter_id.to_string(),
            status: TableOrderStatus::Open,
            guests,
            sale_id: None,
            opened_at: Utc::now(),
            closed_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO table_orders (id, company_id, branch_id, table_id, waiter_id, status, guests, opened_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(&order.company_id)
        .bind(&order.branch_id)
        .bind(&order.table_id)
        .bind(&order.waiter_id)
        .bind(order.status)
        .bind(order.guests)
        .bind(order.opened_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::Core(CoreError::state(
                "table",
                TableStatus::Occupied,
                "the table already has an active order",
            )),
            other => other,
        })?;

        set_table_status(&mut tx, &table.id, TableStatus::Occupied).await?;
        let view = load_view(&mut tx, &self.scope, &table.id).await?;
        tx.commit().await?;

        info!(table = %view.table.label, order_id = %order.id, guests, "Table opened");
        Ok(view)
    }

    /// The table's active order.
    pub async fn active_order(&self, table_id: &str) -> DbResult<TableOrderView> {
        let mut conn = self.pool.acquire().await?;
        load_view(&mut conn, &self.scope, table_id).await
    }

    /// Adds a product; the same product with the same note merges.
    pub async fn add_item(
        &self,
        table_id: &str,
        product_id: &str,
        quantity: i64,
        note: Option<&str>,
    ) -> DbResult<TableOrderView> {
        let mut tx = self.pool.begin().await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        ensure_editable(view.order.status)?;

        let product =
            super::product::find_sellable(&mut tx, &self.scope.company_id, product_id).await?;

        let change = plan_add_item(
            &view.items,
            DraftItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price(),
                quantity,
                note: note.map(str::to_string),
            },
        )?;

        match change {
            ItemChange::Insert(item) => {
                sqlx::query(
                    r#"
                    INSERT INTO table_order_items (
                        id, table_order_id, product_id, name_snapshot,
                        unit_price_cents, quantity, note, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )
                .bind(new_id())
                .bind(&view.order.id)
                .bind(&item.product_id)
                .bind(&item.name)
                .bind(item.unit_price.cents())
                .bind(item.quantity)
                .bind(&item.note)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
            }
            ItemChange::Merge { item_id, quantity } => {
                sqlx::query("UPDATE table_order_items SET quantity = ?2 WHERE id = ?1")
                    .bind(&item_id)
                    .bind(quantity)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        tx.commit().await?;

        debug!(table_id = %table_id, product_id = %product_id, quantity, "Item added to table");
        Ok(view)
    }

    /// Sets a line's quantity; zero removes the line.
    pub async fn set_item_quantity(
        &self,
        table_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<TableOrderView> {
        if quantity != 0 {
            validate_quantity(quantity)?;
        }

        let mut tx = self.pool.begin().await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        ensure_editable(view.order.status)?;
        if !view.items.iter().any(|i| i.id == item_id) {
            return Err(DbError::not_found("Table order item", item_id));
        }

        if quantity == 0 {
            sqlx::query("DELETE FROM table_order_items WHERE id = ?1")
                .bind(item_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query("UPDATE table_order_items SET quantity = ?2 WHERE id = ?1")
                .bind(item_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
        }

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    pub async fn remove_item(&self, table_id: &str, item_id: &str) -> DbResult<TableOrderView> {
        self.set_item_quantity(table_id, item_id, 0).await
    }

    /// Asks for the bill (precuenta); items freeze until reopened.
    pub async fn request_bill(&self, table_id: &str) -> DbResult<TableOrderView> {
        let mut tx = self.pool.begin().await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        ensure_billable(&view.items)?;
        move_order(&mut tx, &view, TableOrderStatus::Billing).await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        tx.commit().await?;

        info!(table = %view.table.label, total = %view.total, "Bill requested");
        Ok(view)
    }

    /// Back from billing to an editable order.
    pub async fn reopen(&self, table_id: &str) -> DbResult<TableOrderView> {
        let mut tx = self.pool.begin().await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        move_order(&mut tx, &view, TableOrderStatus::Open).await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Moves the active order to another free table.
    pub async fn transfer(&self, table_id: &str, to_table_id: &str) -> DbResult<TableOrderView> {
        if table_id == to_table_id {
            return Err(ValidationError::invalid_format(
                "to_table_id",
                "must differ from the current table",
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        let target = find_table(&mut tx, &self.scope, to_table_id).await?;
        ensure_free(target.status)?;

        sqlx::query("UPDATE table_orders SET table_id = ?2 WHERE id = ?1")
            .bind(&view.order.id)
            .bind(&target.id)
            .execute(&mut *tx)
            .await?;
        set_table_status(&mut tx, &view.table.id, TableStatus::Free).await?;
        set_table_status(&mut tx, &target.id, table_status_for(view.order.status)).await?;

        let moved = load_view(&mut tx, &self.scope, &target.id).await?;
        tx.commit().await?;

        info!(from = %view.table.label, to = %target.label, "Table order transferred");
        Ok(moved)
    }

    /// Drops the active order and frees the table.
    pub async fn cancel(&self, table_id: &str) -> DbResult<TableOrder> {
        let mut tx = self.pool.begin().await?;

        let view = load_view(&mut tx, &self.scope, table_id).await?;
        move_order(&mut tx, &view, TableOrderStatus::Cancelled).await?;
        let order = find_order(&mut tx, &view.order.id).await?;

        tx.commit().await?;

        info!(table = %view.table.label, order_id = %order.id, "Table order cancelled");
        Ok(order)
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

const TABLE_COLUMNS: &str =
    "id, company_id, branch_id, label, capacity, status, is_active, created_at";
const ORDER_COLUMNS: &str =
    "id, company_id, branch_id, table_id, waiter_id, status, guests, sale_id, opened_at, closed_at";

async fn find_table(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<DiningTable> {
    sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {TABLE_COLUMNS} FROM dining_tables \
         WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3 AND is_active = 1"
    ))
    .bind(id)
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Table", id))
}

async fn find_order(conn: &mut SqliteConnection, id: &str) -> DbResult<TableOrder> {
    sqlx::query_as::<_, TableOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM table_orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Table order", id))
}

async fn set_table_status(
    conn: &mut SqliteConnection,
    table_id: &str,
    status: TableStatus,
) -> DbResult<()> {
    sqlx::query("UPDATE dining_tables SET status = ?2 WHERE id = ?1")
        .bind(table_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Moves the order through its state machine and mirrors it on the table.
async fn move_order(
    conn: &mut SqliteConnection,
    view: &TableOrderView,
    next: TableOrderStatus,
) -> DbResult<()> {
    let current = view.order.status;
    let next = current.transition(next)?;
    let closed_at = (!next.is_active()).then(Utc::now);

    let result = sqlx::query(
        "UPDATE table_orders SET status = ?2, closed_at = COALESCE(?3, closed_at) WHERE id = ?1 AND status = ?4",
    )
    .bind(&view.order.id)
    .bind(next)
    .bind(closed_at)
    .bind(current)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::transition("table order", current, next).into());
    }

    set_table_status(conn, &view.order.table_id, table_status_for(next)).await
}

/// The active order of a table with its items.
pub(crate) async fn load_view(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    table_id: &str,
) -> DbResult<TableOrderView> {
    let table = find_table(conn, scope, table_id).await?;

    let order = sqlx::query_as::<_, TableOrder>(&format!(
        "SELECT {ORDER_COLUMNS} FROM table_orders \
         WHERE table_id = ?1 AND company_id = ?2 AND status IN ('open', 'billing')"
    ))
    .bind(&table.id)
    .bind(&scope.company_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        DbError::Core(CoreError::state("table", table.status, "there is no active order"))
    })?;

    let items = sqlx::query_as::<_, TableOrderItem>(
        r#"
        SELECT id, table_order_id, product_id, name_snapshot, unit_price_cents,
               quantity, note, created_at
        FROM table_order_items
        WHERE table_order_id = ?1
        ORDER BY created_at, rowid
        "#,
    )
    .bind(&order.id)
    .fetch_all(&mut *conn)
    .await?;

    let total = order_total(&items);
    Ok(TableOrderView {
        table,
        order,
        items,
        total,
    })
}

/// Closes the order billed by `sale_id` and frees its table.
pub(crate) async fn close_for_sale(
    conn: &mut SqliteConnection,
    view: &TableOrderView,
    sale_id: &str,
) -> DbResult<()> {
    move_order(conn, view, TableOrderStatus::Closed).await?;
    sqlx::query("UPDATE table_orders SET sale_id = ?2 WHERE id = ?1")
        .bind(&view.order.id)
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    #[tokio::test]
    async fn test_open_add_merge_and_bill() {
        let fx = fixture().await;
        let tables = fx.db.scoped(&fx.scope).tables();
        let table = tables.create("M-01", 4).await.unwrap();

        tables.open(&table.id, &fx.user_id, 2).await.unwrap();
        tables.add_item(&table.id, &fx.lomo.id, 1, None).await.unwrap();
        tables.add_item(&table.id, &fx.lomo.id, 1, Some("  ")).await.unwrap();
        let view = tables
            .add_item(&table.id, &fx.lomo.id, 1, Some("sin cebolla"))
            .await
            .unwrap();

        assert_eq!(view.items.len(), 2, "blank note merges, real note splits");
        assert_eq!(view.items[0].quantity, 2);
        assert_eq!(view.total, Money::from_cents(10_500));
        assert_eq!(view.table.status, TableStatus::Occupied);

        let billed = tables.request_bill(&table.id).await.unwrap();
        assert_eq!(billed.order.status, TableOrderStatus::Billing);
        assert_eq!(billed.table.status, TableStatus::Billing);

        let err = tables.add_item(&table.id, &fx.inca.id, 1, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));

        let reopened = tables.reopen(&table.id).await.unwrap();
        assert_eq!(reopened.table.status, TableStatus::Occupied);
    }

    #[tokio::test]
    async fn test_cannot_open_twice_or_bill_empty() {
        let fx = fixture().await;
        let tables = fx.db.scoped(&fx.scope).tables();
        let table = tables.create("M-02", 2).await.unwrap();

        tables.open(&table.id, &fx.user_id, 1).await.unwrap();
        assert!(tables.open(&table.id, &fx.user_id, 1).await.is_err());
        assert!(tables.request_bill(&table.id).await.is_err());
    }

    #[tokio::test]
    async fn test_quantity_zero_removes_item() {
        let fx = fixture().await;
        let tables = fx.db.scoped(&fx.scope).tables();
        let table = tables.create("M-03", 4).await.unwrap();
        tables.open(&table.id, &fx.user_id, 2).await.unwrap();

        let view = tables.add_item(&table.id, &fx.inca.id, 2, None).await.unwrap();
        let item_id = view.items[0].id.clone();

        let view = tables.set_item_quantity(&table.id, &item_id, 5).await.unwrap();
        assert_eq!(view.items[0].quantity, 5);

        let view = tables.remove_item(&table.id, &item_id).await.unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_and_cancel() {
        let fx = fixture().await;
        let tables = fx.db.scoped(&fx.scope).tables();
        let a = tables.create("M-04", 4).await.unwrap();
        let b = tables.create("M-05", 4).await.unwrap();

        tables.open(&a.id, &fx.user_id, 3).await.unwrap();
        tables.add_item(&a.id, &fx.beer.id, 2, None).await.unwrap();

        let moved = tables.transfer(&a.id, &b.id).await.unwrap();
        assert_eq!(moved.table.id, b.id);
        assert_eq!(moved.items.len(), 1);

        let listed = tables.list().await.unwrap();
        let status_of = |id: &str| listed.iter().find(|t| t.id == id).map(|t| t.status);
        assert_eq!(status_of(&a.id), Some(TableStatus::Free));
        assert_eq!(status_of(&b.id), Some(TableStatus::Occupied));

        let cancelled = tables.cancel(&b.id).await.unwrap();
        assert_eq!(cancelled.status, TableOrderStatus::Cancelled);
        assert!(cancelled.closed_at.is_some());

        // Free again: can be opened
        tables.open(&b.id, &fx.user_id, 1).await.unwrap();
    }
}
