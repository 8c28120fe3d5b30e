//! # Company Repository
//!
//! Tenants, their branches and their users. This is the only repository
//! that is not built from a [`TenantScope`](tambo_core::TenantScope): it runs
//! before one exists (login, setup, seed).
//!
//! ## Branch Setup
//! ```text
//! create_branch("Miraflores")
//!   ├── branches            Miraflores
//!   ├── warehouses          "Almacén principal" (is_default = 1)
//!   └── document_series     B002 / F002 / NV02   (n-th branch of the company)
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use tambo_core::sale::DocumentKind;
use tambo_core::validation::{validate_name, validate_ruc};
use tambo_core::{Branch, Company, Role, User};

/// Input for [`CompanyRepository::create_company`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewCompany {
    pub ruc: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBranch {
    pub name: String,
    pub address: Option<String>,
}

/// Input for [`CompanyRepository::create_user`]; the password arrives hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub branch_id: String,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Series of the n-th branch of a company (`B001`, `F001`, `NV01` for the first).
fn series_for(kind: DocumentKind, n: i64) -> String {
    match kind {
        DocumentKind::Boleta => format!("B{:03}", n),
        DocumentKind::Factura => format!("F{:03}", n),
        DocumentKind::NotaVenta => format!("NV{:02}", n),
    }
}

#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CompanyRepository { pool }
    }

    pub async fn create_company(&self, input: &NewCompany) -> DbResult<Company> {
        let ruc = input.ruc.trim();
        validate_ruc(ruc)?;
        validate_name("legal_name", &input.legal_name)?;

        let company = Company {
            id: new_id(),
            ruc: ruc.to_string(),
            legal_name: input.legal_name.trim().to_string(),
            trade_name: input.trade_name.clone(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO companies (id, ruc, legal_name, trade_name, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&company.id)
        .bind(&company.ruc)
        .bind(&company.legal_name)
        .bind(&company.trade_name)
        .bind(company.is_active)
        .bind(company.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("ruc", &company.ruc),
            other => other,
        })?;

        info!(company_id = %company.id, ruc = %company.ruc, "Company created");
        Ok(company)
    }

    pub async fn get_company(&self, id: &str) -> DbResult<Company> {
        sqlx::query_as::<_, Company>(
            "SELECT id, ruc, legal_name, trade_name, is_active, created_at FROM companies WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Company", id))
    }

    /// Creates a branch with its default warehouse and document series.
    pub async fn create_branch(&self, company_id: &str, input: &NewBranch) -> DbResult<Branch> {
        validate_name("name", &input.name)?;

        let mut tx = self.pool.begin().await?;

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM companies WHERE id = ?1")
            .bind(company_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Company", company_id));
        }

        let now = Utc::now();
        let branch = Branch {
            id: new_id(),
            company_id: company_id.to_string(),
            name: input.name.trim().to_string(),
            address: input.address.clone(),
            is_active: true,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO branches (id, company_id, name, address, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.company_id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(branch.is_active)
        .bind(branch.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO warehouses (id, company_id, branch_id, name, is_default, is_active, created_at)
            VALUES (?1, ?2, ?3, 'Almacén principal', 1, 1, ?4)
            "#,
        )
        .bind(new_id())
        .bind(company_id)
        .bind(&branch.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM branches WHERE company_id = ?1")
            .bind(company_id)
            .fetch_one(&mut *tx)
            .await?;
        create_series(&mut *tx, company_id, &branch.id, n).await?;

        tx.commit().await?;

        info!(company_id = %company_id, branch_id = %branch.id, "Branch created");
        Ok(branch)
    }

    pub async fn list_branches(&self, company_id: &str) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, company_id, name, address, is_active, created_at
            FROM branches
            WHERE company_id = ?1
            ORDER BY created_at, name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }

    /// Whether `branch_id` belongs to `company_id` and is active.
    pub async fn branch_belongs(&self, company_id: &str, branch_id: &str) -> DbResult<bool> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT id FROM branches WHERE id = ?1 AND company_id = ?2 AND is_active = 1",
        )
        .bind(branch_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    pub async fn create_user(&self, company_id: &str, input: &NewUser) -> DbResult<User> {
        let username = input.username.trim().to_lowercase();
        validate_name("username", &username)?;
        validate_name("full_name", &input.full_name)?;

        if !self.branch_belongs(company_id, &input.branch_id).await? {
            return Err(DbError::not_found("Branch", &input.branch_id));
        }

        let user = User {
            id: new_id(),
            company_id: company_id.to_string(),
            branch_id: input.branch_id.clone(),
            username,
            full_name: input.full_name.trim().to_string(),
            password_hash: input.password_hash.clone(),
            role: input.role,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, company_id, branch_id, username, full_name,
                password_hash, role, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&user.id)
        .bind(&user.company_id)
        .bind(&user.branch_id)
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", &user.username),
            other => other,
        })?;

        debug!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Looks up an active user of an active company for login.
    pub async fn find_login(&self, ruc: &str, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.company_id, u.branch_id, u.username, u.full_name,
                   u.password_hash, u.role, u.is_active, u.created_at
            FROM users u
            INNER JOIN companies c ON c.id = u.company_id
            WHERE c.ruc = ?1 AND u.username = ?2
              AND u.is_active = 1 AND c.is_active = 1
            "#,
        )
        .bind(ruc.trim())
        .bind(username.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, company_id: &str, id: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, company_id, branch_id, username, full_name,
                   password_hash, role, is_active, created_at
            FROM users
            WHERE id = ?1 AND company_id = ?2
            "#,
        )
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))
    }
}

async fn create_series(
    conn: &mut SqliteConnection,
    company_id: &str,
    branch_id: &str,
    n: i64,
) -> DbResult<()> {
    for kind in [DocumentKind::Boleta, DocumentKind::Factura, DocumentKind::NotaVenta] {
        sqlx::query(
            r#"
            INSERT INTO document_series (id, company_id, branch_id, document_kind, series, last_correlative)
            VALUES (?1, ?2, ?3, ?4, ?5, 0)
            "#,
        )
        .bind(new_id())
        .bind(company_id)
        .bind(branch_id)
        .bind(kind)
        .bind(series_for(kind, n))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    #[test]
    fn test_series_for_branch_number() {
        assert_eq!(series_for(DocumentKind::Boleta, 1), DocumentKind::Boleta.default_series());
        assert_eq!(series_for(DocumentKind::Factura, 2), "F002");
        assert_eq!(series_for(DocumentKind::NotaVenta, 3), "NV03");
    }

    #[tokio::test]
    async fn test_second_branch_gets_own_series() {
        let fx = fixture().await;
        let repo = fx.db.companies();

        let second = repo
            .create_branch(
                &fx.scope.company_id,
                &NewBranch {
                    name: "Miraflores".to_string(),
                    address: None,
                },
            )
            .await
            .unwrap();

        let series: Vec<String> = sqlx::query_scalar(
            "SELECT series FROM document_series WHERE branch_id = ?1 ORDER BY series",
        )
        .bind(&second.id)
        .fetch_all(fx.db.pool())
        .await
        .unwrap();
        assert_eq!(series, vec!["B002", "F002", "NV02"]);

        assert_eq!(repo.list_branches(&fx.scope.company_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_login_lookup_is_per_company() {
        let fx = fixture().await;
        let repo = fx.db.companies();

        let found = repo.find_login(&fx.company.ruc, "ADMIN").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(fx.user_id.clone()));

        assert!(repo.find_login("20100070970", "admin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ruc_and_username() {
        let fx = fixture().await;
        let repo = fx.db.companies();

        let err = repo
            .create_company(&NewCompany {
                ruc: fx.company.ruc.clone(),
                legal_name: "Otra SAC".to_string(),
                trade_name: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        let err = repo
            .create_user(
                &fx.scope.company_id,
                &NewUser {
                    branch_id: fx.scope.branch_id.clone(),
                    username: "admin".to_string(),
                    full_name: "Otro".to_string(),
                    password_hash: "x".to_string(),
                    role: Role::Cashier,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_invalid_ruc_rejected() {
        let fx = fixture().await;
        let err = fx
            .db
            .companies()
            .create_company(&NewCompany {
                ruc: "20131312956".to_string(),
                legal_name: "Mala SAC".to_string(),
                trade_name: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }
}
