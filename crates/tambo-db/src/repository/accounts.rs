//! # Accounts Repository
//!
//! Receivables (cuentas por cobrar) opened by credit sales and payables
//! (cuentas por pagar) opened by credit purchases. Both live in
//! `credit_accounts`, told apart by `kind`.
//!
//! A payment is one transaction: `credit_payments` row, balance/status
//! update guarded on the previous balance, and its journal entry.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::{new_id, today};
use tambo_core::accounts::{apply_payment, is_overdue, CreditKind};
use tambo_core::ledger::{collection_entry, payable_payment_entry};
use tambo_core::sale::PaymentMethod;
use tambo_core::{CoreError, CreditAccount, CreditPayment, Money, TenantScope};

use super::ledger::post_entry;

const ACCOUNT_COLUMNS: &str = "id, company_id, branch_id, kind, counterparty_doc, \
     counterparty_name, source, total_cents, balance_cents, status, due_date, created_at";

#[derive(Debug, Clone, Serialize)]
pub struct CreditAccountView {
    #[serde(flatten)]
    pub account: CreditAccount,
    pub overdue: bool,
}

#[derive(Debug, Clone)]
pub struct AccountsRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl AccountsRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        AccountsRepository { pool, scope }
    }

    /// Accounts of one kind, open ones first, oldest due date first.
    pub async fn list(&self, kind: CreditKind) -> DbResult<Vec<CreditAccountView>> {
        let accounts = sqlx::query_as::<_, CreditAccount>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM credit_accounts
            WHERE company_id = ?1 AND branch_id = ?2 AND kind = ?3
            ORDER BY status IN ('paid', 'cancelled'), due_date IS NULL, due_date, created_at
            "#
        ))
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        let today = today();
        Ok(accounts
            .into_iter()
            .map(|account| CreditAccountView {
                overdue: is_overdue(account.status, account.due_date, today),
                account,
            })
            .collect())
    }

    pub async fn payments(&self, account_id: &str) -> DbResult<Vec<CreditPayment>> {
        let mut conn = self.pool.acquire().await?;
        find_account(&mut conn, &self.scope, account_id).await?;

        let payments = sqlx::query_as::<_, CreditPayment>(
            r#"
            SELECT id, account_id, amount_cents, method, journal_entry_id, created_at
            FROM credit_payments
            WHERE account_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(account_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(payments)
    }

    /// Collects from a customer (cobranza).
    pub async fn collect(
        &self,
        account_id: &str,
        amount_cents: i64,
        method: PaymentMethod,
    ) -> DbResult<CreditAccountView> {
        self.register_payment(CreditKind::Receivable, account_id, amount_cents, method)
            .await
    }

    /// Pays a supplier.
    pub async fn pay(
        &self,
        account_id: &str,
        amount_cents: i64,
        method: PaymentMethod,
    ) -> DbResult<CreditAccountView> {
        self.register_payment(CreditKind::Payable, account_id, amount_cents, method)
            .await
    }

    async fn register_payment(
        &self,
        kind: CreditKind,
        account_id: &str,
        amount_cents: i64,
        method: PaymentMethod,
    ) -> DbResult<CreditAccountView> {
        let mut tx = self.pool.begin().await?;

        let account = find_account(&mut tx, &self.scope, account_id).await?;
        if account.kind != kind {
            return Err(DbError::not_found("Account", account_id));
        }

        let amount = Money::from_cents(amount_cents);
        let change = apply_payment(account.status, Money::from_cents(account.balance_cents), amount)?;

        let result = sqlx::query(
            "UPDATE credit_accounts SET balance_cents = ?2, status = ?3 WHERE id = ?1 AND balance_cents = ?4",
        )
        .bind(&account.id)
        .bind(change.balance.cents())
        .bind(change.status)
        .bind(account.balance_cents)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::state("account", account.status, "it changed concurrently").into());
        }

        let who = account
            .counterparty_name
            .clone()
            .unwrap_or_else(|| account.counterparty_doc.clone());
        let draft = match kind {
            CreditKind::Receivable => collection_entry(today(), format!("Cobranza {}", who), method, amount),
            CreditKind::Payable => payable_payment_entry(today(), format!("Pago a {}", who), method, amount),
        };
        let entry = post_entry(&mut tx, &self.scope, &draft.with_source(&account.source)).await?;

        sqlx::query(
            r#"
            INSERT INTO credit_payments (id, account_id, amount_cents, method, journal_entry_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(new_id())
        .bind(&account.id)
        .bind(amount.cents())
        .bind(method)
        .bind(&entry.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let updated = find_account(&mut tx, &self.scope, account_id).await?;
        tx.commit().await?;

        info!(
            account_id = %account_id,
            kind = ?kind,
            amount = %amount,
            balance = %change.balance,
            "Account payment registered"
        );
        Ok(CreditAccountView {
            overdue: is_overdue(updated.status, updated.due_date, today()),
            account: updated,
        })
    }
}

async fn find_account(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<CreditAccount> {
    sqlx::query_as::<_, CreditAccount>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM credit_accounts WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3"
    ))
    .bind(id)
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Account", id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{PurchaseItemInput, PurchaseRequest};
    use crate::test_support::fixture;
    use tambo_core::accounts::AccountStatus;
    use tambo_core::ledger::accounts;

    async fn payable(fx: &crate::test_support::Fixture) -> CreditAccountView {
        let scoped = fx.db.scoped(&fx.scope);
        scoped
            .purchases()
            .record(
                &fx.user_id,
                &PurchaseRequest {
                    warehouse_id: None,
                    supplier_ruc: "20100070970".to_string(),
                    supplier_name: "Backus".to_string(),
                    document_number: "F010-88".to_string(),
                    items: vec![PurchaseItemInput {
                        product_id: fx.beer.id.clone(),
                        quantity: 12,
                        unit_cost_cents: 708,
                    }],
                    on_credit: true,
                    due_date: None,
                    payment_method: None,
                },
            )
            .await
            .unwrap();
        scoped.accounts().list(CreditKind::Payable).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_partial_then_full_payment() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).accounts();
        let view = payable(&fx).await;
        assert_eq!(view.account.balance_cents, 8_496);

        let after = repo.pay(&view.account.id, 4_000, PaymentMethod::Transfer).await.unwrap();
        assert_eq!(after.account.status, AccountStatus::Partial);
        assert_eq!(after.account.balance_cents, 4_496);

        let after = repo.pay(&view.account.id, 4_496, PaymentMethod::Cash).await.unwrap();
        assert_eq!(after.account.status, AccountStatus::Paid);
        assert_eq!(repo.payments(&view.account.id).await.unwrap().len(), 2);

        let trial = fx.db.scoped(&fx.scope).ledger().trial_balance(None).await.unwrap();
        let payables = trial.rows.iter().find(|r| r.code == accounts::PAYABLES).unwrap();
        assert_eq!(payables.credit_balance.cents(), 0);
    }

    #[tokio::test]
    async fn test_overpayment_and_wrong_kind_rejected() {
        let fx = fixture().await;
        let repo = fx.db.scoped(&fx.scope).accounts();
        let view = payable(&fx).await;

        let err = repo.pay(&view.account.id, 9_000, PaymentMethod::Cash).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Overpayment { .. })));

        let err = repo.collect(&view.account.id, 100, PaymentMethod::Cash).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
