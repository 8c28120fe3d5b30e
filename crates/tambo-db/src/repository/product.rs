//! # Product Repository
//!
//! Database operations for the company catalog.
//!
//! ## Key Operations
//! - Listing and searching (name, SKU or category)
//! - Price and flag updates
//! - Soft deletion
//!
//! Products are shared by every branch of a company; stock is per
//! warehouse and lives in [`InventoryRepository`](super::InventoryRepository),
//! which also creates products together with their opening stock.
//!
//! ## Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  User types: "inca"                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LIKE '%inca%' on sku, name, category  (company_id = scope)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INCA-500  | Inca Kola 500ml  | Bebidas   ← match                      │
//! │  INCA-1L   | Inca Kola 1L     | Bebidas   ← match                      │
//! │  LOMO-01   | Lomo saltado     | Fondos                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tambo_core::validation::{validate_name, validate_non_negative_amount};
use tambo_core::{Product, TenantScope};

const PRODUCT_COLUMNS: &str = "id, company_id, sku, name, category, price_cents, \
     track_inventory, allow_negative_stock, is_active, created_at, updated_at";

/// Editable product fields; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub allow_negative_stock: Option<bool>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.scoped(&scope).products();
///
/// let results = repo.list(Some("inca"), 20).await?;
/// let product = repo.get("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        ProductRepository { pool, scope }
    }

    /// Lists active products, optionally filtered by a search term.
    ///
    /// ## Arguments
    /// * `query` - Matched against SKU, name and category (case-insensitive)
    /// * `limit` - Maximum results to return
    pub async fn list(&self, query: Option<&str>, limit: u32) -> DbResult<Vec<Product>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q.to_lowercase()));

        debug!(query = ?pattern, limit = %limit, "Listing products");

        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE company_id = ?1 AND is_active = 1
              AND (?2 IS NULL
                   OR lower(sku) LIKE ?2
                   OR lower(name) LIKE ?2
                   OR lower(COALESCE(category, '')) LIKE ?2)
            ORDER BY name
            LIMIT ?3
            "#
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(&self.scope.company_id)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Product list returned");
        Ok(products)
    }

    /// Gets a product of this company by ID.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - missing, or owned by another company
    pub async fn get(&self, id: &str) -> DbResult<Product> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, &self.scope.company_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Updates name, category, price or the negative stock flag.
    pub async fn update(&self, id: &str, changes: &ProductUpdate) -> DbResult<Product> {
        if let Some(name) = &changes.name {
            validate_name("name", name)?;
        }
        if let Some(price) = changes.price_cents {
            validate_non_negative_amount("price_cents", price)?;
        }

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = COALESCE(?3, name),
                category = COALESCE(?4, category),
                price_cents = COALESCE(?5, price_cents),
                allow_negative_stock = COALESCE(?6, allow_negative_stock),
                updated_at = ?7
            WHERE id = ?1 AND company_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.scope.company_id)
        .bind(changes.name.as_deref().map(str::trim))
        .bind(&changes.category)
        .bind(changes.price_cents)
        .bind(changes.allow_negative_stock)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get(id).await
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sales keep referencing it; it just stops being sellable.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?3 WHERE id = ?1 AND company_id = ?2",
        )
        .bind(id)
        .bind(&self.scope.company_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE company_id = ?1 AND is_active = 1",
        )
        .bind(&self.scope.company_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Loads a product of `company_id`, active or not.
pub(crate) async fn find(
    conn: &mut SqliteConnection,
    company_id: &str,
    id: &str,
) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND company_id = ?2");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

/// Loads an active product that can be sold or ordered.
pub(crate) async fn find_sellable(
    conn: &mut SqliteConnection,
    company_id: &str,
    id: &str,
) -> DbResult<Product> {
    match find(conn, company_id, id).await? {
        Some(p) if p.is_active => Ok(p),
        _ => Err(DbError::not_found("Product", id)),
    }
}

/// Active products ordered for a numbered menu (name, then id).
pub(crate) async fn menu(conn: &mut SqliteConnection, company_id: &str) -> DbResult<Vec<Product>> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE company_id = ?1 AND is_active = 1 ORDER BY name, id"
    );
    let products = sqlx::query_as::<_, Product>(&sql)
        .bind(company_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(products)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, tenant};

    #[tokio::test]
    async fn test_search_by_name_sku_and_category() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).products();

        let all = repo.list(None, 50).await.unwrap();
        assert_eq!(all.len(), 3);

        let found = repo.list(Some("INCA"), 50).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, fx.inca.id);

        let found = repo.list(Some("cusq-6"), 50).await.unwrap();
        assert_eq!(found[0].id, fx.beer.id);
    }

    #[tokio::test]
    async fn test_other_company_cannot_see_product() {
        let fx = fixture().await;
        let (_, other_scope, _) = tenant(&fx.db, "20100070970").await;
        let other = fx.db.scoped(&other_scope).products();

        assert!(matches!(other.get(&fx.lomo.id).await, Err(DbError::NotFound { .. })));
        assert!(other.list(None, 50).await.unwrap().is_empty());
        assert!(other.deactivate(&fx.lomo.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_deactivate() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).products();

        let updated = repo
            .update(
                &fx.lomo.id,
                &ProductUpdate {
                    price_cents: Some(3_800),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 3_800);
        assert_eq!(updated.name, "Lomo saltado");

        repo.deactivate(&fx.lomo.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
        assert!(!repo.get(&fx.lomo.id).await.unwrap().is_active);
    }
}
