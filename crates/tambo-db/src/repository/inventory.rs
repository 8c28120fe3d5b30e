//! # Inventory Repository
//!
//! Warehouses, stock levels and the kardex (inventory movement ledger).
//!
//! ## Movement Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load_level(warehouse, product)          stock row or zero              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StockLevel::receive / issue            tambo-core, weighted average    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  write_movement                                                         │
//! │   ├── UPSERT stock        (quantity, average_cost_cents)                │
//! │   └── INSERT kardex_entries (movement + running balance)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The helpers take a `&mut SqliteConnection` so that checkout, voids and
//! purchases can move stock inside their own transaction.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use tambo_core::inventory::{KardexLine, MovementKind, StockLevel};
use tambo_core::validation::{validate_name, validate_non_negative_amount, validate_sku};
use tambo_core::{
    CoreError, KardexEntry, Money, Product, StockRow, TenantScope, ValidationError, Warehouse,
};

/// Input for [`InventoryRepository::create_product_with_stock`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    /// Shelf price, IGV included.
    pub price_cents: i64,
    #[serde(default = "default_true")]
    pub track_inventory: bool,
    #[serde(default)]
    pub allow_negative_stock: bool,
    /// Opening stock in the branch's default warehouse.
    #[serde(default)]
    pub initial_quantity: i64,
    #[serde(default)]
    pub unit_cost_cents: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustRequest {
    pub warehouse_id: Option<String>,
    pub product_id: String,
    /// Physically counted units.
    pub counted: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from_warehouse_id: String,
    pub to_warehouse_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        InventoryRepository { pool, scope }
    }

    // =========================================================================
    // Warehouses
    // =========================================================================

    pub async fn list_warehouses(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            r#"
            SELECT id, company_id, branch_id, name, is_default, is_active, created_at
            FROM warehouses
            WHERE company_id = ?1 AND branch_id = ?2
            ORDER BY is_default DESC, name
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }

    /// Adds a secondary warehouse to the branch.
    pub async fn create_warehouse(&self, name: &str) -> DbResult<Warehouse> {
        validate_name("name", name)?;

        let warehouse = Warehouse {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            name: name.trim().to_string(),
            is_default: false,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO warehouses (id, company_id, branch_id, name, is_default, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&warehouse.id)
        .bind(&warehouse.company_id)
        .bind(&warehouse.branch_id)
        .bind(&warehouse.name)
        .bind(warehouse.is_default)
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .execute(&self.pool)
        .await?;

        info!(warehouse_id = %warehouse.id, name = %warehouse.name, "Warehouse created");
        Ok(warehouse)
    }

    // =========================================================================
    // Products with stock
    // =========================================================================

    /// Creates a product and, for tracked products with opening stock, its
    /// stock row and `Initial` kardex line in the default warehouse.
    pub async fn create_product_with_stock(&self, input: &NewProduct) -> DbResult<Product> {
        let sku = input.sku.trim().to_uppercase();
        validate_sku(&sku)?;
        validate_name("name", &input.name)?;
        validate_non_negative_amount("price_cents", input.price_cents)?;
        validate_non_negative_amount("unit_cost_cents", input.unit_cost_cents)?;
        if input.initial_quantity < 0 {
            return Err(ValidationError::must_be_positive("initial_quantity").into());
        }
        if input.initial_quantity > 0 && !input.track_inventory {
            return Err(ValidationError::invalid_format(
                "initial_quantity",
                "product does not track inventory",
            )
            .into());
        }

        let now = Utc::now();
        let product = Product {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            sku,
            name: input.name.trim().to_string(),
            category: input.category.clone(),
            price_cents: input.price_cents,
            track_inventory: input.track_inventory,
            allow_negative_stock: input.allow_negative_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, company_id, sku, name, category, price_cents,
                track_inventory, allow_negative_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.company_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.track_inventory)
        .bind(product.allow_negative_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("sku", &product.sku),
            other => other,
        })?;

        if input.initial_quantity > 0 {
            let warehouse = default_warehouse(&mut tx, &self.scope).await?;
            apply_entry(
                &mut tx,
                &warehouse,
                &product,
                MovementKind::Initial,
                input.initial_quantity,
                Money::from_cents(input.unit_cost_cents),
                None,
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            product_id = %product.id,
            sku = %product.sku,
            initial_quantity = input.initial_quantity,
            "Product created"
        );
        Ok(product)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Stock of a warehouse (the default one when `None`).
    pub async fn stock(&self, warehouse_id: Option<&str>) -> DbResult<Vec<StockRow>> {
        let mut conn = self.pool.acquire().await?;
        let warehouse = self.resolve_warehouse(&mut conn, warehouse_id).await?;

        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT s.warehouse_id, s.product_id, p.sku, p.name AS product_name,
                   s.quantity, s.average_cost_cents, s.updated_at
            FROM stock s
            INNER JOIN products p ON p.id = s.product_id
            WHERE s.warehouse_id = ?1 AND s.company_id = ?2
            ORDER BY p.name
            "#,
        )
        .bind(&warehouse.id)
        .bind(&self.scope.company_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Kardex of a product in a warehouse (the default one when `None`),
    /// oldest first.
    pub async fn kardex(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
    ) -> DbResult<Vec<KardexEntry>> {
        let mut conn = self.pool.acquire().await?;
        let warehouse = self.resolve_warehouse(&mut conn, warehouse_id).await?;

        let entries = sqlx::query_as::<_, KardexEntry>(
            r#"
            SELECT id, company_id, branch_id, warehouse_id, product_id, movement,
                   quantity, unit_cost_cents, total_cost_cents, balance_quantity,
                   balance_average_cost_cents, balance_value_cents, reference, created_at
            FROM kardex_entries
            WHERE warehouse_id = ?1 AND product_id = ?2 AND company_id = ?3
            ORDER BY created_at, rowid
            "#,
        )
        .bind(&warehouse.id)
        .bind(product_id)
        .bind(&self.scope.company_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(entries)
    }

    // =========================================================================
    // Movements
    // =========================================================================

    /// Brings stock to a physical count. Returns `None` when nothing changed.
    pub async fn adjust(&self, req: &AdjustRequest) -> DbResult<Option<KardexEntry>> {
        let mut tx = self.pool.begin().await?;

        let warehouse = self.resolve_warehouse(&mut tx, req.warehouse_id.as_deref()).await?;
        let product = tracked_product(&mut tx, &self.scope.company_id, &req.product_id).await?;

        let level = load_level(&mut tx, &warehouse.id, &product.id).await?;
        let entry = match level.adjust_to(req.counted)? {
            None => None,
            Some((_, line)) => Some(
                write_movement(&mut tx, &warehouse, &product.id, &line, Some("adjustment")).await?,
            ),
        };

        tx.commit().await?;

        info!(
            product_id = %product.id,
            from = level.quantity,
            counted = req.counted,
            "Stock adjusted"
        );
        Ok(entry)
    }

    /// Moves units between warehouses of the company at the source's
    /// average cost. Returns the exit and entry kardex lines.
    pub async fn transfer(&self, req: &TransferRequest) -> DbResult<(KardexEntry, KardexEntry)> {
        if req.from_warehouse_id == req.to_warehouse_id {
            return Err(ValidationError::invalid_format(
                "to_warehouse_id",
                "must differ from the source warehouse",
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let from = self.resolve_warehouse(&mut tx, Some(&req.from_warehouse_id)).await?;
        let to = company_warehouse(&mut tx, &self.scope.company_id, &req.to_warehouse_id).await?;
        let product = tracked_product(&mut tx, &self.scope.company_id, &req.product_id).await?;

        let reference = format!("transfer:{}", to.id);
        let exit = apply_exit(
            &mut tx,
            &from,
            &product,
            MovementKind::TransferOut,
            req.quantity,
            Some(&reference),
        )
        .await?;

        let reference = format!("transfer:{}", from.id);
        let entry = apply_entry(
            &mut tx,
            &to,
            &product,
            MovementKind::TransferIn,
            req.quantity,
            Money::from_cents(exit.unit_cost_cents),
            Some(&reference),
        )
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product.id,
            from = %from.id,
            to = %to.id,
            quantity = req.quantity,
            "Stock transferred"
        );
        Ok((exit, entry))
    }

    /// Writes off spoiled or broken units (merma).
    pub async fn record_waste(
        &self,
        product_id: &str,
        quantity: i64,
        warehouse_id: Option<&str>,
    ) -> DbResult<KardexEntry> {
        let mut tx = self.pool.begin().await?;

        let warehouse = self.resolve_warehouse(&mut tx, warehouse_id).await?;
        let product = tracked_product(&mut tx, &self.scope.company_id, product_id).await?;
        let entry = apply_exit(
            &mut tx,
            &warehouse,
            &product,
            MovementKind::Waste,
            quantity,
            Some("waste"),
        )
        .await?;

        tx.commit().await?;

        debug!(product_id = %product_id, quantity, "Waste recorded");
        Ok(entry)
    }

    /// A warehouse of this branch, or the branch default.
    async fn resolve_warehouse(
        &self,
        conn: &mut SqliteConnection,
        warehouse_id: Option<&str>,
    ) -> DbResult<Warehouse> {
        match warehouse_id {
            None => default_warehouse(conn, &self.scope).await,
            Some(id) => {
                let warehouse = company_warehouse(conn, &self.scope.company_id, id).await?;
                if warehouse.branch_id != self.scope.branch_id {
                    return Err(DbError::not_found("Warehouse", id));
                }
                Ok(warehouse)
            }
        }
    }
}

// =============================================================================
// Shared helpers (used inside other repositories' transactions)
// =============================================================================

const WAREHOUSE_COLUMNS: &str = "id, company_id, branch_id, name, is_default, is_active, created_at";

/// The branch's default warehouse.
pub(crate) async fn default_warehouse(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
) -> DbResult<Warehouse> {
    let sql = format!(
        "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE company_id = ?1 AND branch_id = ?2 AND is_default = 1"
    );
    sqlx::query_as::<_, Warehouse>(&sql)
        .bind(&scope.company_id)
        .bind(&scope.branch_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Warehouse", "default"))
}

/// An active warehouse of any branch of the company.
pub(crate) async fn company_warehouse(
    conn: &mut SqliteConnection,
    company_id: &str,
    id: &str,
) -> DbResult<Warehouse> {
    let sql = format!(
        "SELECT {WAREHOUSE_COLUMNS} FROM warehouses WHERE id = ?1 AND company_id = ?2 AND is_active = 1"
    );
    sqlx::query_as::<_, Warehouse>(&sql)
        .bind(id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Warehouse", id))
}

pub(crate) async fn tracked_product(
    conn: &mut SqliteConnection,
    company_id: &str,
    id: &str,
) -> DbResult<Product> {
    let product = super::product::find_sellable(conn, company_id, id).await?;
    if !product.track_inventory {
        return Err(CoreError::state("Product", &product.sku, "does not track inventory").into());
    }
    Ok(product)
}

/// Current level of a product in a warehouse; zero when there is no row yet.
pub(crate) async fn load_level(
    conn: &mut SqliteConnection,
    warehouse_id: &str,
    product_id: &str,
) -> DbResult<StockLevel> {
    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT quantity, average_cost_cents FROM stock WHERE warehouse_id = ?1 AND product_id = ?2",
    )
    .bind(warehouse_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row
        .map(|(quantity, cost)| StockLevel::new(quantity, Money::from_cents(cost)))
        .unwrap_or_default())
}

/// Receives units into a warehouse.
pub(crate) async fn apply_entry(
    conn: &mut SqliteConnection,
    warehouse: &Warehouse,
    product: &Product,
    movement: MovementKind,
    quantity: i64,
    unit_cost: Money,
    reference: Option<&str>,
) -> DbResult<KardexEntry> {
    let level = load_level(conn, &warehouse.id, &product.id).await?;
    let (_, line) = level.receive(movement, quantity, unit_cost)?;
    write_movement(conn, warehouse, &product.id, &line, reference).await
}

/// Issues units from a warehouse at its average cost.
///
/// ## Errors
/// `InsufficientStock` unless the product allows negative stock.
pub(crate) async fn apply_exit(
    conn: &mut SqliteConnection,
    warehouse: &Warehouse,
    product: &Product,
    movement: MovementKind,
    quantity: i64,
    reference: Option<&str>,
) -> DbResult<KardexEntry> {
    let level = load_level(conn, &warehouse.id, &product.id).await?;
    let (_, line) = level.issue(movement, quantity, &product.sku, product.allow_negative_stock)?;
    write_movement(conn, warehouse, &product.id, &line, reference).await
}

/// Persists the new balance and its kardex line.
async fn write_movement(
    conn: &mut SqliteConnection,
    warehouse: &Warehouse,
    product_id: &str,
    line: &KardexLine,
    reference: Option<&str>,
) -> DbResult<KardexEntry> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO stock (warehouse_id, product_id, company_id, quantity, average_cost_cents, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (warehouse_id, product_id) DO UPDATE SET
            quantity = excluded.quantity,
            average_cost_cents = excluded.average_cost_cents,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&warehouse.id)
    .bind(product_id)
    .bind(&warehouse.company_id)
    .bind(line.balance.quantity)
    .bind(line.balance.average_cost.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let entry = KardexEntry {
        id: new_id(),
        company_id: warehouse.company_id.clone(),
        branch_id: warehouse.branch_id.clone(),
        warehouse_id: warehouse.id.clone(),
        product_id: product_id.to_string(),
        movement: line.movement,
        quantity: line.quantity,
        unit_cost_cents: line.unit_cost.cents(),
        total_cost_cents: line.total_cost.cents(),
        balance_quantity: line.balance.quantity,
        balance_average_cost_cents: line.balance.average_cost.cents(),
        balance_value_cents: line.balance.value().cents(),
        reference: reference.map(str::to_string),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO kardex_entries (
            id, company_id, branch_id, warehouse_id, product_id, movement,
            quantity, unit_cost_cents, total_cost_cents, balance_quantity,
            balance_average_cost_cents, balance_value_cents, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.company_id)
    .bind(&entry.branch_id)
    .bind(&entry.warehouse_id)
    .bind(&entry.product_id)
    .bind(entry.movement)
    .bind(entry.quantity)
    .bind(entry.unit_cost_cents)
    .bind(entry.total_cost_cents)
    .bind(entry.balance_quantity)
    .bind(entry.balance_average_cost_cents)
    .bind(entry.balance_value_cents)
    .bind(&entry.reference)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %product_id,
        movement = ?line.movement,
        quantity = line.quantity,
        balance = line.balance.quantity,
        "Kardex movement written"
    );
    Ok(entry)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, product};

    #[tokio::test]
    async fn test_initial_stock_creates_kardex_line() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).inventory();

        let stock = repo.stock(None).await.unwrap();
        assert_eq!(stock.len(), 2, "untracked dish has no stock row");

        let kardex = repo.kardex(&fx.inca.id, None).await.unwrap();
        assert_eq!(kardex.len(), 1);
        assert_eq!(kardex[0].movement, MovementKind::Initial);
        assert_eq!(kardex[0].balance_quantity, 20);
        assert_eq!(kardex[0].balance_value_cents, 5_000);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let fx = fixture().await;
        let err = fx
            .db
            .scoped(&fx.scope)
            .inventory()
            .create_product_with_stock(&product("inca-500", "Otra", 100, true, 0, 0))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_adjust_to_count() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).inventory();

        let entry = repo
            .adjust(&AdjustRequest {
                warehouse_id: None,
                product_id: fx.inca.id.clone(),
                counted: 17,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.movement, MovementKind::AdjustmentOut);
        assert_eq!(entry.quantity, 3);
        assert_eq!(entry.balance_quantity, 17);

        let unchanged = repo
            .adjust(&AdjustRequest {
                warehouse_id: None,
                product_id: fx.inca.id.clone(),
                counted: 17,
            })
            .await
            .unwrap();
        assert!(unchanged.is_none());
    }

    #[tokio::test]
    async fn test_transfer_keeps_average_cost() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).inventory();
        let main = repo.list_warehouses().await.unwrap().remove(0);
        let bar = repo.create_warehouse("Barra").await.unwrap();

        let (exit, entry) = repo
            .transfer(&TransferRequest {
                from_warehouse_id: main.id.clone(),
                to_warehouse_id: bar.id.clone(),
                product_id: fx.beer.id.clone(),
                quantity: 4,
            })
            .await
            .unwrap();

        assert_eq!(exit.balance_quantity, 6);
        assert_eq!(entry.balance_quantity, 4);
        assert_eq!(entry.unit_cost_cents, 600);

        let err = repo
            .transfer(&TransferRequest {
                from_warehouse_id: bar.id.clone(),
                to_warehouse_id: main.id.clone(),
                product_id: fx.beer.id.clone(),
                quantity: 5,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn test_waste_and_untracked_product() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).inventory();

        let entry = repo.record_waste(&fx.inca.id, 2, None).await.unwrap();
        assert_eq!(entry.movement, MovementKind::Waste);
        assert_eq!(entry.total_cost_cents, 500);

        let err = repo.record_waste(&fx.lomo.id, 1, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));
    }
}
