//! # Cash Repository
//!
//! Registers (cajas), their sessions and manual cash movements.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open(register, opening)                                                │
//! │     └── INSERT cash_sessions status='open'                              │
//! │         (idx_cash_sessions_one_open rejects a second open session)      │
//! │                                                                         │
//! │  sales / voids / add_movement   ← require status = 'open'               │
//! │                                                                         │
//! │  close(counted)                                                         │
//! │     └── CashSummary::from_activity → expected, variance                 │
//! │         UPDATE ... WHERE status = 'open'  (rows_affected = 1)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use tambo_core::cash::{
    ensure_open, CashMovementKind, CashSessionStatus, CashSummary, SessionActivity,
};
use tambo_core::sale::PaymentMethod;
use tambo_core::validation::{validate_name, validate_non_negative_amount, validate_positive_amount};
use tambo_core::{CashMovement, CashRegister, CashSession, CoreError, Money, TenantScope};

/// A session with its live (or final) summary.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: CashSession,
    pub summary: CashSummary,
    pub movements: Vec<CashMovement>,
}

#[derive(Debug, Clone)]
pub struct CashRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl CashRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        CashRepository { pool, scope }
    }

    pub async fn list_registers(&self) -> DbResult<Vec<CashRegister>> {
        let registers = sqlx::query_as::<_, CashRegister>(
            r#"
            SELECT id, company_id, branch_id, name, is_active, created_at
            FROM cash_registers
            WHERE company_id = ?1 AND branch_id = ?2
            ORDER BY name
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registers)
    }

    pub async fn create_register(&self, name: &str) -> DbResult<CashRegister> {
        validate_name("name", name)?;

        let register = CashRegister {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_registers (id, company_id, branch_id, name, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&register.id)
        .bind(&register.company_id)
        .bind(&register.branch_id)
        .bind(&register.name)
        .bind(register.is_active)
        .bind(register.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("name", &register.name),
            other => other,
        })?;

        Ok(register)
    }

    /// Opens a session on a register.
    ///
    /// ## Errors
    /// `InvalidState` when the register already has an open session.
    pub async fn open(
        &self,
        register_id: &str,
        user_id: &str,
        opening_cents: i64,
    ) -> DbResult<CashSession> {
        validate_non_negative_amount("opening_cents", opening_cents)?;

        let register: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM cash_registers
            WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3 AND is_active = 1
            "#,
        )
        .bind(register_id)
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .fetch_optional(&self.pool)
        .await?;
        if register.is_none() {
            return Err(DbError::not_found("Cash register", register_id));
        }

        let session = CashSession {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            register_id: register_id.to_string(),
            user_id: user_id.to_string(),
            status: CashSessionStatus::Open,
            opening_cents,
            expected_cents: None,
            counted_cents: None,
            variance_cents: None,
            opened_at: Utc::now(),
            closed_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, company_id, branch_id, register_id, user_id, status,
                opening_cents, opened_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&session.id)
        .bind(&session.company_id)
        .bind(&session.branch_id)
        .bind(&session.register_id)
        .bind(&session.user_id)
        .bind(session.status)
        .bind(session.opening_cents)
        .bind(session.opened_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::Core(CoreError::state(
                "cash register",
                CashSessionStatus::Open,
                "it already has an open session",
            )),
            other => other,
        })?;

        info!(session_id = %session.id, register_id = %register_id, opening_cents, "Cash session opened");
        Ok(session)
    }

    /// The open session of a register, if any.
    pub async fn current_session(&self, register_id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM cash_sessions \
             WHERE register_id = ?1 AND company_id = ?2 AND branch_id = ?3 AND status = 'open'"
        ))
        .bind(register_id)
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> DbResult<SessionView> {
        let mut conn = self.pool.acquire().await?;
        let session = find_session(&mut conn, &self.scope, id).await?;
        view(&mut conn, session).await
    }

    /// Records a manual income or expense in an open session.
    pub async fn add_movement(
        &self,
        session_id: &str,
        user_id: &str,
        kind: CashMovementKind,
        amount_cents: i64,
        description: &str,
    ) -> DbResult<CashMovement> {
        validate_positive_amount("amount_cents", amount_cents)?;
        validate_name("description", description)?;

        let mut tx = self.pool.begin().await?;

        let session = find_session(&mut tx, &self.scope, session_id).await?;
        ensure_open(session.status)?;

        if kind == CashMovementKind::Expense {
            let summary = summarize(&mut tx, &session).await?;
            summary.check_expense(Money::from_cents(amount_cents))?;
        }

        let movement = CashMovement {
            id: new_id(),
            session_id: session.id.clone(),
            user_id: user_id.to_string(),
            kind,
            amount_cents,
            description: description.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_movements (id, session_id, user_id, kind, amount_cents, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.session_id)
        .bind(&movement.user_id)
        .bind(movement.kind)
        .bind(movement.amount_cents)
        .bind(&movement.description)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(movement)
    }

    /// Closes a session against the counted cash (arqueo).
    pub async fn close(&self, session_id: &str, counted_cents: i64) -> DbResult<SessionView> {
        validate_non_negative_amount("counted_cents", counted_cents)?;

        let mut tx = self.pool.begin().await?;

        let session = find_session(&mut tx, &self.scope, session_id).await?;
        ensure_open(session.status)?;

        let summary = summarize(&mut tx, &session).await?;
        let variance = summary.variance(Money::from_cents(counted_cents));

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions SET
                status = 'closed',
                expected_cents = ?2,
                counted_cents = ?3,
                variance_cents = ?4,
                closed_at = ?5
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&session.id)
        .bind(summary.expected.cents())
        .bind(counted_cents)
        .bind(variance.cents())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::state(
                "cash session",
                CashSessionStatus::Closed,
                "the session is already closed",
            )
            .into());
        }

        let closed = find_session(&mut tx, &self.scope, session_id).await?;
        let closed = view(&mut tx, closed).await?;
        tx.commit().await?;

        info!(
            session_id = %session_id,
            expected = summary.expected.cents(),
            counted_cents,
            variance = variance.cents(),
            "Cash session closed"
        );
        Ok(closed)
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

const SESSION_COLUMNS: &str = "id, company_id, branch_id, register_id, user_id, status, \
     opening_cents, expected_cents, counted_cents, variance_cents, opened_at, closed_at";

/// A session of this branch.
pub(crate) async fn find_session(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<CashSession> {
    sqlx::query_as::<_, CashSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM cash_sessions WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3"
    ))
    .bind(id)
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Cash session", id))
}

async fn summarize(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<CashSummary> {
    let payments: Vec<(PaymentMethod, i64)> = sqlx::query_as(
        r#"
        SELECT sp.method, SUM(sp.amount_cents)
        FROM sale_payments sp
        INNER JOIN sales s ON s.id = sp.sale_id
        WHERE s.session_id = ?1 AND s.status = 'completed'
        GROUP BY sp.method
        "#,
    )
    .bind(&session.id)
    .fetch_all(&mut *conn)
    .await?;

    let (incomes, expenses): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN kind = 'income' THEN amount_cents END), 0),
            COALESCE(SUM(CASE WHEN kind = 'expense' THEN amount_cents END), 0)
        FROM cash_movements
        WHERE session_id = ?1
        "#,
    )
    .bind(&session.id)
    .fetch_one(&mut *conn)
    .await?;

    let (sales_count, voided_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'voided' THEN 1 ELSE 0 END), 0)
        FROM sales
        WHERE session_id = ?1
        "#,
    )
    .bind(&session.id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(CashSummary::from_activity(&SessionActivity {
        opening: Money::from_cents(session.opening_cents),
        payments: payments
            .into_iter()
            .map(|(method, amount)| (method, Money::from_cents(amount)))
            .collect(),
        incomes: Money::from_cents(incomes),
        expenses: Money::from_cents(expenses),
        sales_count,
        voided_count,
    }))
}

async fn view(conn: &mut SqliteConnection, session: CashSession) -> DbResult<SessionView> {
    let summary = summarize(conn, &session).await?;

    let movements = sqlx::query_as::<_, CashMovement>(
        r#"
        SELECT id, session_id, user_id, kind, amount_cents, description, created_at
        FROM cash_movements
        WHERE session_id = ?1
        ORDER BY created_at, rowid
        "#,
    )
    .bind(&session.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(SessionView {
        session,
        summary,
        movements,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    #[tokio::test]
    async fn test_second_open_on_register_fails() {
        let fx = fixture().await;
        let cash = fx.db.scoped(&fx.scope).cash();
        let register = cash.create_register("Caja 1").await.unwrap();

        cash.open(&register.id, &fx.user_id, 5_000).await.unwrap();
        let err = cash.open(&register.id, &fx.user_id, 5_000).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));

        assert!(cash.current_session(&register.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_close_computes_variance() {
        let fx = fixture().await;
        let cash = fx.db.scoped(&fx.scope).cash();
        let session_id = fx.open_session().await;

        cash.add_movement(&session_id, &fx.user_id, CashMovementKind::Income, 2_000, "Sencillo")
            .await
            .unwrap();
        cash.add_movement(&session_id, &fx.user_id, CashMovementKind::Expense, 1_500, "Hielo")
            .await
            .unwrap();

        let closed = cash.close(&session_id, 10_400).await.unwrap();
        assert_eq!(closed.session.status, CashSessionStatus::Closed);
        assert_eq!(closed.summary.expected, Money::from_cents(10_500));
        assert_eq!(closed.session.variance_cents, Some(-100));
        assert_eq!(closed.movements.len(), 2);

        let err = cash.close(&session_id, 10_400).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));

        let err = cash
            .add_movement(&session_id, &fx.user_id, CashMovementKind::Income, 100, "Tarde")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_expense_cannot_exceed_drawer() {
        let fx = fixture().await;
        let session_id = fx.open_session().await;

        let err = fx
            .db
            .scoped(&fx.scope)
            .cash()
            .add_movement(&session_id, &fx.user_id, CashMovementKind::Expense, 10_001, "Gas")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidState { .. })));
    }
}
