//! # Purchase Repository
//!
//! Supplier invoices (compras). Recording one receives the goods into a
//! warehouse, books the entry and, when bought on credit, opens a payable.
//!
//! Supplier unit costs are IGV-inclusive as printed on the invoice; the
//! kardex carries the base cost since the IGV is recovered as tax credit.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::{new_id, today};
use tambo_core::accounts::{AccountStatus, CreditKind};
use tambo_core::inventory::MovementKind;
use tambo_core::ledger::{accounts, purchase_entry};
use tambo_core::sale::PaymentMethod;
use tambo_core::validation::{validate_name, validate_positive_amount, validate_quantity, validate_ruc};
use tambo_core::{
    CoreError, Money, Purchase, PurchaseItem, TenantScope, ValidationError, IGV_RATE, MAX_LINES,
};

use super::inventory::{apply_entry, company_warehouse, default_warehouse, tracked_product};
use super::ledger::post_entry;

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseItemInput {
    pub product_id: String,
    pub quantity: i64,
    /// IGV included.
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    /// Defaults to the branch's main warehouse.
    pub warehouse_id: Option<String>,
    pub supplier_ruc: String,
    pub supplier_name: String,
    pub document_number: String,
    pub items: Vec<PurchaseItemInput>,
    #[serde(default)]
    pub on_credit: bool,
    pub due_date: Option<NaiveDate>,
    /// How a cash purchase was paid; ignored on credit.
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDetail {
    #[serde(flatten)]
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        PurchaseRepository { pool, scope }
    }

    /// Registers a supplier invoice.
    ///
    /// ## Errors
    /// - `UniqueViolation` when the same supplier document was already recorded
    /// - `InvalidState` for a product that does not track inventory
    pub async fn record(&self, user_id: &str, req: &PurchaseRequest) -> DbResult<PurchaseDetail> {
        validate_ruc(&req.supplier_ruc)?;
        validate_name("supplier_name", &req.supplier_name)?;
        if req.document_number.trim().is_empty() {
            return Err(ValidationError::required("document_number").into());
        }
        if req.items.is_empty() {
            return Err(ValidationError::required("items").into());
        }
        if req.items.len() > MAX_LINES {
            return Err(CoreError::TooManyLines { max: MAX_LINES }.into());
        }
        for item in &req.items {
            validate_quantity(item.quantity)?;
            validate_positive_amount("unit_cost_cents", item.unit_cost_cents)?;
        }

        let mut tx = self.pool.begin().await?;

        let warehouse = match &req.warehouse_id {
            Some(id) => {
                let w = company_warehouse(&mut tx, &self.scope.company_id, id).await?;
                if w.branch_id != self.scope.branch_id {
                    return Err(DbError::not_found("Warehouse", id));
                }
                w
            }
            None => default_warehouse(&mut tx, &self.scope).await?,
        };

        let total: Money = req
            .items
            .iter()
            .map(|i| Money::from_cents(i.unit_cost_cents) * i.quantity)
            .sum();
        let (taxable, igv) = total.split_inclusive(IGV_RATE);
        let document_number = req.document_number.trim().to_uppercase();
        let now = Utc::now();

        let purchase = Purchase {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            warehouse_id: warehouse.id.clone(),
            user_id: user_id.to_string(),
            supplier_ruc: req.supplier_ruc.clone(),
            supplier_name: req.supplier_name.trim().to_string(),
            document_number: document_number.clone(),
            total_cents: total.cents(),
            taxable_cents: taxable.cents(),
            igv_cents: igv.cents(),
            on_credit: req.on_credit,
            due_date: req.due_date,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, company_id, branch_id, warehouse_id, user_id, supplier_ruc, supplier_name,
                document_number, total_cents, taxable_cents, igv_cents, on_credit, due_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.company_id)
        .bind(&purchase.branch_id)
        .bind(&purchase.warehouse_id)
        .bind(&purchase.user_id)
        .bind(&purchase.supplier_ruc)
        .bind(&purchase.supplier_name)
        .bind(&purchase.document_number)
        .bind(purchase.total_cents)
        .bind(purchase.taxable_cents)
        .bind(purchase.igv_cents)
        .bind(purchase.on_credit)
        .bind(purchase.due_date)
        .bind(purchase.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("document_number", &document_number),
            other => other,
        })?;

        let reference = format!("{} {}", purchase.supplier_ruc, document_number);
        let mut items = Vec::with_capacity(req.items.len());
        for input in &req.items {
            let product = tracked_product(&mut tx, &self.scope.company_id, &input.product_id).await?;
            let unit_cost = Money::from_cents(input.unit_cost_cents);
            let (base_cost, _) = unit_cost.split_inclusive(IGV_RATE);

            apply_entry(
                &mut tx,
                &warehouse,
                &product,
                MovementKind::Purchase,
                input.quantity,
                base_cost,
                Some(reference.as_str()),
            )
            .await?;

            let item = PurchaseItem {
                id: new_id(),
                purchase_id: purchase.id.clone(),
                product_id: product.id.clone(),
                quantity: input.quantity,
                unit_cost_cents: unit_cost.cents(),
                line_total_cents: (unit_cost * input.quantity).cents(),
            };
            sqlx::query(
                r#"
                INSERT INTO purchase_items (id, purchase_id, product_id, quantity, unit_cost_cents, line_total_cents)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.purchase_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
            items.push(item);
        }

        let source = format!("purchase:{}", purchase.id);
        let settle_account = if req.on_credit {
            accounts::PAYABLES
        } else {
            req.payment_method
                .unwrap_or(PaymentMethod::Cash)
                .ledger_account()
        };
        post_entry(
            &mut tx,
            &self.scope,
            &purchase_entry(today(), &reference, taxable, igv, settle_account).with_source(&source),
        )
        .await?;

        if req.on_credit {
            sqlx::query(
                r#"
                INSERT INTO credit_accounts (
                    id, company_id, branch_id, kind, counterparty_doc, counterparty_name,
                    source, total_cents, balance_cents, status, due_date, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(new_id())
            .bind(&self.scope.company_id)
            .bind(&self.scope.branch_id)
            .bind(CreditKind::Payable)
            .bind(&purchase.supplier_ruc)
            .bind(&purchase.supplier_name)
            .bind(&source)
            .bind(purchase.total_cents)
            .bind(AccountStatus::Pending)
            .bind(purchase.due_date)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            supplier = %purchase.supplier_ruc,
            document = %document_number,
            total = %total,
            on_credit = purchase.on_credit,
            "Purchase recorded"
        );
        Ok(PurchaseDetail { purchase, items })
    }

    /// Purchases of the branch, newest first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, company_id, branch_id, warehouse_id, user_id, supplier_ruc, supplier_name,
                   document_number, total_cents, taxable_cents, igv_cents, on_credit, due_date, created_at
            FROM purchases
            WHERE company_id = ?1 AND branch_id = ?2
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    fn invoice(product_id: &str, on_credit: bool) -> PurchaseRequest {
        PurchaseRequest {
            warehouse_id: None,
            supplier_ruc: "20100070970".to_string(),
            supplier_name: "Distribuidora Lima SAC".to_string(),
            document_number: "f001-000123".to_string(),
            items: vec![PurchaseItemInput {
                product_id: product_id.to_string(),
                quantity: 10,
                // S/ 2.95 incl. IGV → S/ 2.50 base
                unit_cost_cents: 295,
            }],
            on_credit,
            due_date: None,
            payment_method: None,
        }
    }

    #[tokio::test]
    async fn test_purchase_receives_stock_at_base_cost() {
        let fx = fixture().await;
        let scoped = fx.db.scoped(&fx.scope);

        let detail = scoped.purchases().record(&fx.user_id, &invoice(&fx.inca.id, false)).await.unwrap();
        assert_eq!(detail.purchase.total_cents, 2_950);
        assert_eq!(detail.purchase.taxable_cents + detail.purchase.igv_cents, 2_950);
        assert_eq!(detail.purchase.document_number, "F001-000123");

        let kardex = scoped.inventory().kardex(&fx.inca.id, None).await.unwrap();
        let last = kardex.last().unwrap();
        assert_eq!(last.movement, MovementKind::Purchase);
        assert_eq!(last.unit_cost_cents, 250);
        assert_eq!(last.balance_quantity, 30);

        let trial = scoped.ledger().trial_balance(None).await.unwrap();
        assert!(trial.is_balanced);
        let caja = trial.rows.iter().find(|r| r.code == accounts::CASH).unwrap();
        assert_eq!(caja.credit.cents(), 2_950);
    }

    #[tokio::test]
    async fn test_credit_purchase_opens_payable_and_rejects_duplicates() {
        let fx = fixture().await;
        let scoped = fx.db.scoped(&fx.scope);

        scoped.purchases().record(&fx.user_id, &invoice(&fx.beer.id, true)).await.unwrap();
        let payables = scoped.accounts().list(CreditKind::Payable).await.unwrap();
        assert_eq!(payables.len(), 1);
        assert_eq!(payables[0].account.balance_cents, 2_950);

        let err = scoped
            .purchases()
            .record(&fx.user_id, &invoice(&fx.beer.id, true))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_untracked_product_cannot_be_purchased() {
        let fx = fixture().await;
        let err = fx
            .db
            .scoped(&fx.scope)
            .purchases()
            .record(&fx.user_id, &invoice(&fx.lomo.id, false))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));
        assert!(fx.db.scoped(&fx.scope).purchases().list(10).await.unwrap().is_empty());
    }
}
