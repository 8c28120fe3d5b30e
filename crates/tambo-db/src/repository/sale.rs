//! # Sale Repository
//!
//! Checkout and voids. Each is one SQLite transaction touching sales,
//! stock, kardex, the journal and receivables.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Cash session must be open                                           │
//! │  2. Lines from: explicit items | table preventa | online order          │
//! │  3. price_lines → check_document → settle                               │
//! │  4. Kardex exits (tracked products) → cost of sale                      │
//! │  5. Correlative: UPDATE document_series ... RETURNING                   │
//! │  6. INSERT sale, sale_items, sale_payments                              │
//! │  7. Journal: sale entry + cost of sale entry  (source "sale:<id>")      │
//! │  8. Credit remainder → receivable                                       │
//! │  9. Close preventa / mark order sold                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure rolls the whole transaction back: no correlative is burnt,
//! no stock moves.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{new_id, today};
use tambo_core::accounts::{ensure_cancellable, AccountStatus, CreditKind};
use tambo_core::cash::ensure_open;
use tambo_core::inventory::MovementKind;
use tambo_core::ledger::{cost_of_sale_entry, sale_entry, SalePosting};
use tambo_core::sale::{
    check_document, format_document_number, price_lines, settle, Customer, DocumentKind,
    LineInput, PaymentMethod, SaleStatus, TenderInput,
};
use tambo_core::{CoreError, Money, Product, Sale, SaleItem, SalePayment, TenantScope};

use super::inventory::{apply_entry, apply_exit, company_warehouse, default_warehouse};
use super::ledger::{drafts_for_source, post_entry};

const SALE_COLUMNS: &str = "id, company_id, branch_id, session_id, user_id, document_kind, \
     series, correlative, document_number, customer_doc_type, customer_doc_number, \
     customer_name, status, gross_cents, discount_cents, total_cents, taxable_cents, \
     igv_cents, paid_cents, change_cents, credit_cents, cost_cents, table_order_id, \
     order_id, created_at, voided_at";

/// A product line requested at the counter.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

/// Where the lines of a sale come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleSource {
    Items { items: Vec<ItemRequest> },
    Table { table_id: String },
    Order { order_id: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    pub document_kind: DocumentKind,
    pub customer: Customer,
    pub source: SaleSource,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub payments: Vec<TenderInput>,
    #[serde(default)]
    pub allow_credit: bool,
    pub due_date: Option<chrono::NaiveDate>,
}

/// A sale with its lines and payments.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

/// Where the lines came from, for closing it after the sale.
enum Origin {
    Counter,
    Table(super::table::TableOrderView),
    Order(String),
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        SaleRepository { pool, scope }
    }

    /// Registers a complete sale (venta).
    ///
    /// ## Errors
    /// - `InvalidState` when the session is closed or the table/order is not billable
    /// - `InsufficientStock` for a tracked product without enough units
    /// - `DocumentRule` / `InvalidPayment` from the checkout rules
    /// - `NotFound` for products, tables or orders of another tenant
    pub async fn checkout(&self, req: &CheckoutRequest) -> DbResult<SaleDetail> {
        let mut tx = self.pool.begin().await?;

        let session = super::cash::find_session(&mut tx, &self.scope, &req.session_id).await?;
        ensure_open(session.status)?;

        let (origin, lines, products) = self.collect_lines(&mut tx, &req.source).await?;
        let (priced, totals) = price_lines(&lines, Money::from_cents(req.discount_cents))?;

        check_document(req.document_kind, &req.customer, totals.total)?;
        let settlement = settle(totals.total, &req.payments, req.allow_credit, &req.customer)?;

        let (series, correlative) = next_correlative(&mut tx, &self.scope, req.document_kind).await?;
        let document_number = format_document_number(&series, correlative);

        // Stock leaves the branch's default warehouse at its average cost.
        let warehouse = default_warehouse(&mut tx, &self.scope).await?;
        let mut unit_costs = Vec::with_capacity(priced.len());
        for (line, product) in priced.iter().zip(&products) {
            if product.track_inventory {
                let exit = apply_exit(
                    &mut tx,
                    &warehouse,
                    product,
                    MovementKind::Sale,
                    line.quantity,
                    Some(document_number.as_str()),
                )
                .await?;
                unit_costs.push(exit.unit_cost_cents);
            } else {
                unit_costs.push(0);
            }
        }
        let cost: Money = priced
            .iter()
            .zip(&unit_costs)
            .map(|(line, unit)| Money::from_cents(*unit) * line.quantity)
            .sum();

        let now = Utc::now();
        let (table_order_id, order_id) = match &origin {
            Origin::Counter => (None, None),
            Origin::Table(view) => (Some(view.order.id.clone()), None),
            Origin::Order(id) => (None, Some(id.clone())),
        };

        let sale = Sale {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            session_id: session.id.clone(),
            user_id: req.user_id.clone(),
            document_kind: req.document_kind,
            series,
            correlative,
            document_number: document_number.clone(),
            customer_doc_type: req.customer.doc_type,
            customer_doc_number: req.customer.doc_number.clone(),
            customer_name: req.customer.name.clone(),
            status: SaleStatus::Completed,
            gross_cents: totals.gross.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            taxable_cents: totals.taxable.cents(),
            igv_cents: totals.igv.cents(),
            paid_cents: settlement.paid.cents(),
            change_cents: settlement.change.cents(),
            credit_cents: settlement.credit.cents(),
            cost_cents: cost.cents(),
            table_order_id,
            order_id,
            created_at: now,
            voided_at: None,
        };
        insert_sale(&mut tx, &sale).await?;

        let mut items = Vec::with_capacity(priced.len());
        for (line, unit_cost) in priced.iter().zip(&unit_costs) {
            let item = SaleItem {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price.cents(),
                quantity: line.quantity,
                discount_cents: line.discount.cents(),
                line_total_cents: line.line_total.cents(),
                unit_cost_cents: *unit_cost,
                created_at: now,
            };
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
                    quantity, discount_cents, line_total_cents, unit_cost_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.discount_cents)
            .bind(item.line_total_cents)
            .bind(item.unit_cost_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        let mut payments = Vec::with_capacity(settlement.payments.len());
        for applied in &settlement.payments {
            let payment = SalePayment {
                id: new_id(),
                sale_id: sale.id.clone(),
                method: applied.method,
                amount_cents: applied.amount.cents(),
                tendered_cents: applied.tendered.map(|m| m.cents()),
                reference: applied.reference.clone(),
                created_at: now,
            };
            sqlx::query(
                r#"
                INSERT INTO sale_payments (id, sale_id, method, amount_cents, tendered_cents, reference, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&payment.id)
            .bind(&payment.sale_id)
            .bind(payment.method)
            .bind(payment.amount_cents)
            .bind(payment.tendered_cents)
            .bind(&payment.reference)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;
            payments.push(payment);
        }

        // Books
        let source = sale_source(&sale.id);
        let date = today();
        let cash = settlement.amount_for(PaymentMethod::Cash);
        let posting = SalePosting {
            cash,
            bank: settlement.paid - cash,
            receivable: settlement.credit,
            taxable: totals.taxable,
            igv: totals.igv,
        };
        post_entry(
            &mut tx,
            &self.scope,
            &sale_entry(date, &document_number, &posting).with_source(&source),
        )
        .await?;
        if let Some(draft) = cost_of_sale_entry(date, &document_number, cost) {
            post_entry(&mut tx, &self.scope, &draft.with_source(&source)).await?;
        }

        if settlement.credit.is_positive() {
            create_receivable(&mut tx, &self.scope, &sale, req).await?;
        }

        match &origin {
            Origin::Counter => {}
            Origin::Table(view) => super::table::close_for_sale(&mut tx, view, &sale.id).await?,
            Origin::Order(id) => super::order::mark_sold(&mut tx, id, &sale.id).await?,
        }

        tx.commit().await?;

        info!(
            document = %document_number,
            total = %totals.total,
            change = %settlement.change,
            credit = %settlement.credit,
            lines = items.len(),
            "Sale completed"
        );

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    /// Resolves the request into priced-line inputs and their products.
    async fn collect_lines(
        &self,
        conn: &mut SqliteConnection,
        source: &SaleSource,
    ) -> DbResult<(Origin, Vec<LineInput>, Vec<Product>)> {
        let company_id = &self.scope.company_id;
        let mut lines = Vec::new();
        let mut products = Vec::new();

        let origin = match source {
            SaleSource::Items { items } => {
                for item in items {
                    let product =
                        super::product::find_sellable(conn, company_id, &item.product_id).await?;
                    lines.push(LineInput {
                        product_id: product.id.clone(),
                        sku: product.sku.clone(),
                        name: product.name.clone(),
                        unit_price: product.price(),
                        quantity: item.quantity,
                        discount: Money::from_cents(item.discount_cents),
                    });
                    products.push(product);
                }
                Origin::Counter
            }
            SaleSource::Table { table_id } => {
                let view = super::table::load_view(conn, &self.scope, table_id).await?;
                for item in &view.items {
                    let product = super::product::find(conn, company_id, &item.product_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Product", &item.product_id))?;
                    lines.push(LineInput {
                        product_id: product.id.clone(),
                        sku: product.sku.clone(),
                        name: item.name_snapshot.clone(),
                        unit_price: Money::from_cents(item.unit_price_cents),
                        quantity: item.quantity,
                        discount: Money::zero(),
                    });
                    products.push(product);
                }
                Origin::Table(view)
            }
            SaleSource::Order { order_id } => {
                let detail = super::order::load_for_checkout(conn, &self.scope, order_id).await?;
                for item in &detail.items {
                    let product = super::product::find(conn, company_id, &item.product_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Product", &item.product_id))?;
                    lines.push(LineInput {
                        product_id: product.id.clone(),
                        sku: product.sku.clone(),
                        name: item.name_snapshot.clone(),
                        unit_price: Money::from_cents(item.unit_price_cents),
                        quantity: item.quantity,
                        discount: Money::zero(),
                    });
                    products.push(product);
                }
                Origin::Order(detail.order.id)
            }
        };

        Ok((origin, lines, products))
    }

    pub async fn get(&self, id: &str) -> DbResult<SaleDetail> {
        let mut conn = self.pool.acquire().await?;
        let sale = find_sale(&mut conn, &self.scope, id).await?;
        detail(&mut conn, sale).await
    }

    /// Sales of the branch, newest first; optionally only one session's.
    pub async fn list(&self, session_id: Option<&str>, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE company_id = ?1 AND branch_id = ?2 AND (?3 IS NULL OR session_id = ?3)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?4
            "#
        ))
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Voids a sale while its cash session is still open.
    ///
    /// Restocks what the sale took out, mirrors its journal entries and
    /// cancels its receivable. A receivable with collections blocks the void.
    /// An online order billed by the sale becomes billable again; a table
    /// preventa stays closed, since the table may already be seated again.
    pub async fn void(&self, id: &str, user_id: &str) -> DbResult<SaleDetail> {
        let mut tx = self.pool.begin().await?;

        let sale = find_sale(&mut tx, &self.scope, id).await?;
        if sale.status != SaleStatus::Completed {
            return Err(CoreError::state("sale", sale.status, "it is already voided").into());
        }

        let session = super::cash::find_session(&mut tx, &self.scope, &sale.session_id).await?;
        ensure_open(session.status)?;

        let source = sale_source(&sale.id);

        let receivable: Option<(String, AccountStatus)> = sqlx::query_as(
            "SELECT id, status FROM credit_accounts WHERE company_id = ?1 AND source = ?2",
        )
        .bind(&self.scope.company_id)
        .bind(&source)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some((account_id, status)) = &receivable {
            ensure_cancellable(*status)?;
            sqlx::query(
                "UPDATE credit_accounts SET status = 'cancelled', balance_cents = 0 WHERE id = ?1",
            )
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        }

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE sales SET status = 'voided', voided_at = ?2 WHERE id = ?1 AND status = 'completed'",
        )
        .bind(&sale.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::transition("sale", SaleStatus::Completed, SaleStatus::Voided).into());
        }

        // Return exactly what left each warehouse, at the cost it left with.
        let exits: Vec<(String, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT warehouse_id, product_id, quantity, unit_cost_cents
            FROM kardex_entries
            WHERE company_id = ?1 AND movement = 'sale' AND reference = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(&sale.document_number)
        .fetch_all(&mut *tx)
        .await?;

        for (warehouse_id, product_id, quantity, unit_cost) in exits {
            let warehouse = company_warehouse(&mut tx, &self.scope.company_id, &warehouse_id).await?;
            let product = super::product::find(&mut tx, &self.scope.company_id, &product_id)
                .await?
                .ok_or_else(|| DbError::not_found("Product", &product_id))?;
            apply_entry(
                &mut tx,
                &warehouse,
                &product,
                MovementKind::SaleVoid,
                quantity,
                Money::from_cents(unit_cost),
                Some(sale.document_number.as_str()),
            )
            .await?;
        }

        if let Some(order_id) = &sale.order_id {
            super::order::release_sale(&mut tx, order_id, &sale.id).await?;
        }

        let date = today();
        for draft in drafts_for_source(&mut tx, &self.scope.company_id, &source).await? {
            let reversal = draft
                .mirror(date, format!("Anulación {}", draft.description))
                .with_source(format!("void:{}", sale.id));
            post_entry(&mut tx, &self.scope, &reversal).await?;
        }

        let voided = find_sale(&mut tx, &self.scope, &sale.id).await?;
        let detail = detail(&mut tx, voided).await?;
        tx.commit().await?;

        warn!(
            document = %sale.document_number,
            user_id = %user_id,
            total = sale.total_cents,
            "Sale voided"
        );
        Ok(detail)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn sale_source(sale_id: &str) -> String {
    format!("sale:{}", sale_id)
}

/// Allocates the next correlative of the branch's series for `kind`.
async fn next_correlative(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    kind: DocumentKind,
) -> DbResult<(String, i64)> {
    let row: Option<(String, i64)> = sqlx::query_as(
        r#"
        UPDATE document_series
        SET last_correlative = last_correlative + 1
        WHERE company_id = ?1 AND branch_id = ?2 AND document_kind = ?3
        RETURNING series, last_correlative
        "#,
    )
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .bind(kind)
    .fetch_optional(&mut *conn)
    .await?;

    let (series, correlative) =
        row.ok_or_else(|| DbError::not_found("Document series", kind.default_series()))?;
    debug!(series = %series, correlative, "Correlative allocated");
    Ok((series, correlative))
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO sales ({SALE_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, \
          ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)"
    ))
    .bind(&sale.id)
    .bind(&sale.company_id)
    .bind(&sale.branch_id)
    .bind(&sale.session_id)
    .bind(&sale.user_id)
    .bind(sale.document_kind)
    .bind(&sale.series)
    .bind(sale.correlative)
    .bind(&sale.document_number)
    .bind(sale.customer_doc_type)
    .bind(&sale.customer_doc_number)
    .bind(&sale.customer_name)
    .bind(sale.status)
    .bind(sale.gross_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(sale.taxable_cents)
    .bind(sale.igv_cents)
    .bind(sale.paid_cents)
    .bind(sale.change_cents)
    .bind(sale.credit_cents)
    .bind(sale.cost_cents)
    .bind(&sale.table_order_id)
    .bind(&sale.order_id)
    .bind(sale.created_at)
    .bind(sale.voided_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn create_receivable(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    sale: &Sale,
    req: &CheckoutRequest,
) -> DbResult<()> {
    let counterparty = req.customer.doc_number.clone().unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO credit_accounts (
            id, company_id, branch_id, kind, counterparty_doc, counterparty_name,
            source, total_cents, balance_cents, status, due_date, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(new_id())
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .bind(CreditKind::Receivable)
    .bind(&counterparty)
    .bind(&req.customer.name)
    .bind(sale_source(&sale.id))
    .bind(sale.credit_cents)
    .bind(AccountStatus::Pending)
    .bind(req.due_date)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(document = %sale.document_number, credit = sale.credit_cents, "Receivable created");
    Ok(())
}

async fn find_sale(conn: &mut SqliteConnection, scope: &TenantScope, id: &str) -> DbResult<Sale> {
    sqlx::query_as::<_, Sale>(&format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3"
    ))
    .bind(id)
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Sale", id))
}

async fn detail(conn: &mut SqliteConnection, sale: Sale) -> DbResult<SaleDetail> {
    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT id, sale_id, product_id, sku_snapshot, name_snapshot, unit_price_cents,
               quantity, discount_cents, line_total_cents, unit_cost_cents, created_at
        FROM sale_items
        WHERE sale_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(&sale.id)
    .fetch_all(&mut *conn)
    .await?;

    let payments = sqlx::query_as::<_, SalePayment>(
        r#"
        SELECT id, sale_id, method, amount_cents, tendered_cents, reference, created_at
        FROM sale_payments
        WHERE sale_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(&sale.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(SaleDetail {
        sale,
        items,
        payments,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, tenant, Fixture};
    use tambo_core::ledger::accounts;
    use tambo_core::sale::CustomerDocType;

    fn cash(cents: i64) -> TenderInput {
        TenderInput {
            method: PaymentMethod::Cash,
            amount_cents: cents,
            reference: None,
        }
    }

    fn items(list: &[(&str, i64)]) -> SaleSource {
        SaleSource::Items {
            items: list
                .iter()
                .map(|(id, qty)| ItemRequest {
                    product_id: id.to_string(),
                    quantity: *qty,
                    discount_cents: 0,
                })
                .collect(),
        }
    }

    fn request(fx: &Fixture, session_id: &str, source: SaleSource, payments: Vec<TenderInput>) -> CheckoutRequest {
        CheckoutRequest {
            session_id: session_id.to_string(),
            user_id: fx.user_id.clone(),
            document_kind: DocumentKind::Boleta,
            customer: Customer::anonymous(),
            source,
            discount_cents: 0,
            payments,
            allow_credit: false,
            due_date: None,
        }
    }

    async fn stock_of(fx: &Fixture, product_id: &str) -> i64 {
        fx.db
            .scoped(&fx.scope)
            .inventory()
            .stock(None)
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.product_id == product_id)
            .map(|r| r.quantity)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_checkout_totals_change_and_kardex() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;
        let sales = fx.db.scoped(&fx.scope).sales();

        // 2 × 5.00 + 1 × 35.00 = 45.00, paid with 50.00
        let detail = sales
            .checkout(&request(
                &fx,
                &session_id,
                items(&[(&fx.inca.id, 2), (&fx.lomo.id, 1)]),
                vec![cash(5_000)],
            ))
            .await
            .unwrap();

        assert_eq!(detail.sale.total_cents, 4_500);
        assert_eq!(detail.sale.change_cents, 500);
        assert_eq!(detail.sale.taxable_cents + detail.sale.igv_cents, 4_500);
        assert_eq!(detail.sale.document_number, "B001-00000001");
        assert_eq!(detail.sale.cost_cents, 500);
        assert_eq!(detail.items[0].unit_cost_cents, 250);
        assert_eq!(detail.payments[0].amount_cents, 4_500);
        assert_eq!(detail.payments[0].tendered_cents, Some(5_000));
        assert_eq!(stock_of(&fx, &fx.inca.id).await, 18);

        let second = sales
            .checkout(&request(&fx, &session_id, items(&[(&fx.inca.id, 1)]), vec![cash(500)]))
            .await
            .unwrap();
        assert_eq!(second.sale.correlative, 2);

        let trial = fx.db.scoped(&fx.scope).ledger().trial_balance(None).await.unwrap();
        assert!(trial.is_balanced);
        let sales_row = trial.rows.iter().find(|r| r.code == accounts::SALES).unwrap();
        assert_eq!(sales_row.credit.cents(), second.sale.taxable_cents + detail.sale.taxable_cents);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;
        let sales = fx.db.scoped(&fx.scope).sales();

        let err = sales
            .checkout(&request(&fx, &session_id, items(&[(&fx.beer.id, 11)]), vec![cash(20_000)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(stock_of(&fx, &fx.beer.id).await, 10);

        // The failed attempt did not burn a correlative
        let ok = sales
            .checkout(&request(&fx, &session_id, items(&[(&fx.beer.id, 1)]), vec![cash(1_200)]))
            .await
            .unwrap();
        assert_eq!(ok.sale.correlative, 1);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_checkout() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;
        fx.db.scoped(&fx.scope).cash().close(&session_id, 10_000).await.unwrap();

        let err = fx
            .db
            .scoped(&fx.scope)
            .sales()
            .checkout(&request(&fx, &session_id, items(&[(&fx.lomo.id, 1)]), vec![cash(3_500)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_other_company_product_is_not_found() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;
        let (_, other_scope, _) = tenant(&fx.db, "20100070970").await;
        let foreign = fx
            .db
            .scoped(&other_scope)
            .inventory()
            .create_product_with_stock(&crate::test_support::product("X-1", "Ajeno", 100, false, 0, 0))
            .await
            .unwrap();

        let err = fx
            .db
            .scoped(&fx.scope)
            .sales()
            .checkout(&request(&fx, &session_id, items(&[(&foreign.id, 1)]), vec![cash(100)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_table_checkout_frees_table() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;
        let scoped = fx.db.scoped(&fx.scope);
        let tables = scoped.tables();
        let table = tables.create("M-10", 4).await.unwrap();
        tables.open(&table.id, &fx.user_id, 2).await.unwrap();
        tables.add_item(&table.id, &fx.lomo.id, 2, None).await.unwrap();
        tables.request_bill(&table.id).await.unwrap();

        let detail = scoped
            .sales()
            .checkout(&request(
                &fx,
                &session_id,
                SaleSource::Table {
                    table_id: table.id.clone(),
                },
                vec![TenderInput {
                    method: PaymentMethod::Yape,
                    amount_cents: 7_000,
                    reference: Some("op-123".to_string()),
                }],
            ))
            .await
            .unwrap();

        assert_eq!(detail.sale.total_cents, 7_000);
        assert!(detail.sale.table_order_id.is_some());

        let listed = tables.list().await.unwrap();
        assert_eq!(listed[0].status, tambo_core::table::TableStatus::Free);
        assert!(tables.active_order(&table.id).await.is_err());
    }

    #[tokio::test]
    async fn test_credit_remainder_creates_receivable() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;
        let scoped = fx.db.scoped(&fx.scope);

        let mut req = request(&fx, &session_id, items(&[(&fx.lomo.id, 2)]), vec![cash(2_000)]);
        req.allow_credit = true;
        req.customer = Customer {
            doc_type: CustomerDocType::Dni,
            doc_number: Some("45678912".to_string()),
            name: Some("Rosa Quispe".to_string()),
        };

        let detail = scoped.sales().checkout(&req).await.unwrap();
        assert_eq!(detail.sale.credit_cents, 5_000);

        let receivables = scoped.accounts().list(CreditKind::Receivable).await.unwrap();
        assert_eq!(receivables.len(), 1);
        assert_eq!(receivables[0].account.balance_cents, 5_000);
    }

    #[tokio::test]
    async fn test_void_restocks_and_reverses() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;
        let scoped = fx.db.scoped(&fx.scope);

        let detail = scoped
            .sales()
            .checkout(&request(&fx, &session_id, items(&[(&fx.beer.id, 3)]), vec![cash(3_600)]))
            .await
            .unwrap();
        assert_eq!(stock_of(&fx, &fx.beer.id).await, 7);

        let voided = scoped.sales().void(&detail.sale.id, &fx.user_id).await.unwrap();
        assert_eq!(voided.sale.status, SaleStatus::Voided);
        assert_eq!(stock_of(&fx, &fx.beer.id).await, 10);

        let trial = scoped.ledger().trial_balance(None).await.unwrap();
        let caja = trial.rows.iter().find(|r| r.code == accounts::CASH).unwrap();
        assert_eq!(caja.debit_balance.cents(), 0);

        assert!(scoped.sales().void(&detail.sale.id, &fx.user_id).await.is_err());

        let view = scoped.cash().get_session(&session_id).await.unwrap();
        assert_eq!(view.summary.voided_count, 1);
        assert_eq!(view.summary.expected.cents(), 10_000);
    }
}
