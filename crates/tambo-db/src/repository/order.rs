//! # Order Repository
//!
//! Online orders (pedidos) placed through WhatsApp. Staff move them through
//! the kitchen/dispatch states; the cashier bills them with
//! [`SaleSource::Order`](super::SaleSource).

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use tambo_core::whatsapp::OrderDraft;
use tambo_core::{CoreError, Order, OrderChannel, OrderItem, OrderStatus, TenantScope};

const ORDER_COLUMNS: &str = "id, company_id, branch_id, channel, customer_phone, fulfillment, \
     address, payment_method, status, total_cents, sale_id, created_at, updated_at";

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        OrderRepository { pool, scope }
    }

    /// Orders of the branch, newest first, optionally by status.
    pub async fn list(&self, status: Option<OrderStatus>, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE company_id = ?1 AND branch_id = ?2 AND (?3 IS NULL OR status = ?3)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?4
            "#
        ))
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn get(&self, id: &str) -> DbResult<OrderDetail> {
        let mut conn = self.pool.acquire().await?;
        let order = find_order(&mut conn, &self.scope, id).await?;
        with_items(&mut conn, order).await
    }

    /// Moves an order to its next kitchen/dispatch status.
    pub async fn advance(&self, id: &str, next: OrderStatus) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = find_order(&mut tx, &self.scope, id).await?;
        if !order.status.can_advance_to(next, order.fulfillment) {
            return Err(CoreError::transition("order", order.status, next).into());
        }

        let result = sqlx::query(
            "UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(&order.id)
        .bind(next)
        .bind(Utc::now())
        .bind(order.status)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::transition("order", order.status, next).into());
        }

        let updated = find_order(&mut tx, &self.scope, id).await?;
        tx.commit().await?;

        info!(order_id = %id, from = %order.status, to = %next, "Order status changed");
        Ok(updated)
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

async fn find_order(conn: &mut SqliteConnection, scope: &TenantScope, id: &str) -> DbResult<Order> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3"
    ))
    .bind(id)
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Order", id))
}

async fn with_items(conn: &mut SqliteConnection, order: Order) -> DbResult<OrderDetail> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, product_id, name_snapshot, unit_price_cents, quantity
        FROM order_items
        WHERE order_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(&order.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(OrderDetail { order, items })
}

/// Most recent order of a customer phone in the branch.
pub(crate) async fn latest_for_phone(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    phone: &str,
) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(&format!(
        r#"
        SELECT {ORDER_COLUMNS}
        FROM orders
        WHERE company_id = ?1 AND branch_id = ?2 AND customer_phone = ?3
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#
    ))
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .bind(phone)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(order)
}

/// Persists a confirmed cart as a received order.
pub(crate) async fn create_from_draft(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    phone: &str,
    draft: &OrderDraft,
) -> DbResult<Order> {
    let now = Utc::now();
    let order = Order {
        id: new_id(),
        company_id: scope.company_id.clone(),
        branch_id: scope.branch_id.clone(),
        channel: OrderChannel::WhatsApp,
        customer_phone: phone.to_string(),
        fulfillment: draft.fulfillment,
        address: draft.address.clone(),
        payment_method: draft.payment_method,
        status: OrderStatus::Received,
        total_cents: draft.total.cents(),
        sale_id: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO orders ({ORDER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
    ))
    .bind(&order.id)
    .bind(&order.company_id)
    .bind(&order.branch_id)
    .bind(order.channel)
    .bind(&order.customer_phone)
    .bind(order.fulfillment)
    .bind(&order.address)
    .bind(order.payment_method)
    .bind(order.status)
    .bind(order.total_cents)
    .bind(&order.sale_id)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for line in &draft.lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, name_snapshot, unit_price_cents, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(new_id())
        .bind(&order.id)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(line.unit_price.cents())
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }

    info!(order_id = %order.id, phone = %phone, total = %draft.total, "Online order received");
    Ok(order)
}

/// An order that can still be billed: not cancelled, not sold.
pub(crate) async fn load_for_checkout(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<OrderDetail> {
    let order = find_order(conn, scope, id).await?;
    if order.status == OrderStatus::Cancelled {
        return Err(CoreError::state("order", order.status, "a cancelled order cannot be billed").into());
    }
    if order.sale_id.is_some() {
        return Err(CoreError::state("order", order.status, "it was already billed").into());
    }
    with_items(conn, order).await
}

pub(crate) async fn mark_sold(conn: &mut SqliteConnection, id: &str, sale_id: &str) -> DbResult<()> {
    let result = sqlx::query(
        "UPDATE orders SET sale_id = ?2, updated_at = ?3 WHERE id = ?1 AND sale_id IS NULL",
    )
    .bind(id)
    .bind(sale_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::state("order", "billed", "it was already billed").into());
    }
    Ok(())
}

/// Makes the order billable again after its sale was voided.
pub(crate) async fn release_sale(conn: &mut SqliteConnection, id: &str, sale_id: &str) -> DbResult<()> {
    sqlx::query("UPDATE orders SET sale_id = NULL, updated_at = ?3 WHERE id = ?1 AND sale_id = ?2")
        .bind(id)
        .bind(sale_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
