//! # Ledger Repository
//!
//! Libro diario (journal), mayor (per-account ledger) and the trial balance.
//!
//! ## Posting
//! ```text
//! JournalEntryDraft ──validate()──► next "journal" sequence ──► journal_entries
//!                                                          └──► journal_lines
//! ```
//! Entries are numbered per company from the `sequences` table inside the
//! caller's transaction, so a rolled back sale leaves no gap.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use tambo_core::ledger::{
    find_account, JournalEntryDraft, LedgerAccount, PostedLine, TrialBalance,
};
use tambo_core::{JournalEntry, JournalLine, Money, TenantScope};

/// A journal entry with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntryView {
    #[serde(flatten)]
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
}

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        LedgerRepository { pool, scope }
    }

    /// Posts a manual entry.
    pub async fn post(&self, draft: &JournalEntryDraft) -> DbResult<JournalEntryView> {
        let mut tx = self.pool.begin().await?;
        let entry = post_entry(&mut tx, &self.scope, draft).await?;
        let lines = entry_lines(&mut tx, &entry.id).await?;
        tx.commit().await?;

        Ok(JournalEntryView { entry, lines })
    }

    /// Libro diario between two dates (inclusive), in number order.
    pub async fn journal(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DbResult<Vec<JournalEntryView>> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, company_id, branch_id, number, entry_date, description, source, created_at
            FROM journal_entries
            WHERE company_id = ?1
              AND (?2 IS NULL OR entry_date >= ?2)
              AND (?3 IS NULL OR entry_date <= ?3)
            ORDER BY number
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let lines = sqlx::query_as::<_, JournalLine>(
            r#"
            SELECT l.id, l.entry_id, l.account_code, l.debit_cents, l.credit_cents, l.memo
            FROM journal_lines l
            INNER JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.company_id = ?1
              AND (?2 IS NULL OR e.entry_date >= ?2)
              AND (?3 IS NULL OR e.entry_date <= ?3)
            ORDER BY l.rowid
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut by_entry: HashMap<String, Vec<JournalLine>> = HashMap::new();
        for line in lines {
            by_entry.entry(line.entry_id.clone()).or_default().push(line);
        }

        Ok(entries
            .into_iter()
            .map(|entry| {
                let lines = by_entry.remove(&entry.id).unwrap_or_default();
                JournalEntryView { entry, lines }
            })
            .collect())
    }

    /// Mayor of one account with its running balance.
    pub async fn account(
        &self,
        code: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DbResult<LedgerAccount> {
        let account = find_account(code).ok_or_else(|| DbError::not_found("Account", code))?;

        let rows: Vec<(i64, NaiveDate, String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT e.number, e.entry_date, e.description, l.debit_cents, l.credit_cents
            FROM journal_lines l
            INNER JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.company_id = ?1 AND l.account_code = ?2
              AND (?3 IS NULL OR e.entry_date >= ?3)
              AND (?4 IS NULL OR e.entry_date <= ?4)
            ORDER BY e.number, l.rowid
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(code)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let lines: Vec<PostedLine> = rows
            .into_iter()
            .map(|(entry_number, entry_date, description, debit, credit)| PostedLine {
                entry_number,
                entry_date,
                description,
                debit: Money::from_cents(debit),
                credit: Money::from_cents(credit),
            })
            .collect();

        Ok(LedgerAccount::build(account, &lines))
    }

    /// Balance de comprobación up to `to` (inclusive).
    pub async fn trial_balance(&self, to: Option<NaiveDate>) -> DbResult<TrialBalance> {
        let sums: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT l.account_code, SUM(l.debit_cents), SUM(l.credit_cents)
            FROM journal_lines l
            INNER JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.company_id = ?1 AND (?2 IS NULL OR e.entry_date <= ?2)
            GROUP BY l.account_code
            "#,
        )
        .bind(&self.scope.company_id)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let sums: Vec<(String, Money, Money)> = sums
            .into_iter()
            .map(|(code, d, c)| (code, Money::from_cents(d), Money::from_cents(c)))
            .collect();

        Ok(TrialBalance::build(&sums))
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Increments and returns a per-company counter.
pub(crate) async fn next_sequence(
    conn: &mut SqliteConnection,
    company_id: &str,
    name: &str,
) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sequences (company_id, name, value) VALUES (?1, ?2, 1)
        ON CONFLICT (company_id, name) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(company_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value)
}

/// Validates, numbers and stores a journal entry.
pub(crate) async fn post_entry(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    draft: &JournalEntryDraft,
) -> DbResult<JournalEntry> {
    draft.validate()?;

    let number = next_sequence(conn, &scope.company_id, "journal").await?;
    let entry = JournalEntry {
        id: new_id(),
        company_id: scope.company_id.clone(),
        branch_id: scope.branch_id.clone(),
        number,
        entry_date: draft.date,
        description: draft.description.trim().to_string(),
        source: draft.source.clone(),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO journal_entries (id, company_id, branch_id, number, entry_date, description, source, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.company_id)
    .bind(&entry.branch_id)
    .bind(entry.number)
    .bind(entry.entry_date)
    .bind(&entry.description)
    .bind(&entry.source)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    for line in &draft.lines {
        sqlx::query(
            r#"
            INSERT INTO journal_lines (id, entry_id, account_code, debit_cents, credit_cents, memo)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(new_id())
        .bind(&entry.id)
        .bind(&line.account_code)
        .bind(line.debit.cents())
        .bind(line.credit.cents())
        .bind(&line.memo)
        .execute(&mut *conn)
        .await?;
    }

    debug!(number, description = %entry.description, "Journal entry posted");
    Ok(entry)
}

/// Lines of one entry in insertion order.
pub(crate) async fn entry_lines(
    conn: &mut SqliteConnection,
    entry_id: &str,
) -> DbResult<Vec<JournalLine>> {
    let lines = sqlx::query_as::<_, JournalLine>(
        r#"
        SELECT id, entry_id, account_code, debit_cents, credit_cents, memo
        FROM journal_lines
        WHERE entry_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(entry_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Rebuilds the draft of every entry posted for `source`, in number order.
pub(crate) async fn drafts_for_source(
    conn: &mut SqliteConnection,
    company_id: &str,
    source: &str,
) -> DbResult<Vec<JournalEntryDraft>> {
    let entries = sqlx::query_as::<_, JournalEntry>(
        r#"
        SELECT id, company_id, branch_id, number, entry_date, description, source, created_at
        FROM journal_entries
        WHERE company_id = ?1 AND source = ?2
        ORDER BY number
        "#,
    )
    .bind(company_id)
    .bind(source)
    .fetch_all(&mut *conn)
    .await?;

    let mut drafts = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut draft = JournalEntryDraft::new(entry.entry_date, entry.description);
        draft.source = entry.source;
        for line in entry_lines(conn, &entry.id).await? {
            draft = draft
                .debit(&line.account_code, Money::from_cents(line.debit_cents))
                .credit(&line.account_code, Money::from_cents(line.credit_cents));
        }
        drafts.push(draft);
    }

    Ok(drafts)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, tenant};
    use tambo_core::ledger::accounts;
    use tambo_core::CoreError;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn capital_entry(d: u32, amount: i64) -> JournalEntryDraft {
        JournalEntryDraft::new(day(d), "Depósito de caja a banco")
            .debit(accounts::BANK, Money::from_cents(amount))
            .credit(accounts::CASH, Money::from_cents(amount))
    }

    #[tokio::test]
    async fn test_entries_numbered_per_company() {
        let fx = fixture().await;
        let (_, other_scope, _) = tenant(&fx.db, "20100070970").await;

        let ours = fx.db.scoped(&fx.scope).ledger();
        let theirs = fx.db.scoped(&other_scope).ledger();

        assert_eq!(ours.post(&capital_entry(1, 100)).await.unwrap().entry.number, 1);
        assert_eq!(ours.post(&capital_entry(2, 100)).await.unwrap().entry.number, 2);
        assert_eq!(theirs.post(&capital_entry(2, 100)).await.unwrap().entry.number, 1);

        assert_eq!(ours.journal(None, None).await.unwrap().len(), 2);
        assert_eq!(theirs.journal(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unbalanced_entry_rejected() {
        let fx = fixture().await;
        let draft = JournalEntryDraft::new(day(1), "Descuadre")
            .debit(accounts::BANK, Money::from_cents(100))
            .credit(accounts::CASH, Money::from_cents(90));

        let err = fx.db.scoped(&fx.scope).ledger().post(&draft).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UnbalancedEntry { .. })));

        // Nothing consumed the sequence
        let ok = fx.db.scoped(&fx.scope).ledger().post(&capital_entry(1, 50)).await.unwrap();
        assert_eq!(ok.entry.number, 1);
    }

    #[tokio::test]
    async fn test_mayor_and_trial_balance() {
        let fx = fixture().await;
        let ledger = fx.db.scoped(&fx.scope).ledger();

        ledger.post(&capital_entry(1, 1_000)).await.unwrap();
        ledger.post(&capital_entry(5, 500)).await.unwrap();

        let bank = ledger.account(accounts::BANK, None, None).await.unwrap();
        assert_eq!(bank.rows.len(), 2);
        assert_eq!(bank.balance, Money::from_cents(1_500));

        let bank = ledger.account(accounts::BANK, Some(day(2)), None).await.unwrap();
        assert_eq!(bank.balance, Money::from_cents(500));

        let trial = ledger.trial_balance(None).await.unwrap();
        assert!(trial.is_balanced);
        assert_eq!(trial.rows.len(), 2);
        assert_eq!(trial.rows[0].code, accounts::CASH);
        assert_eq!(trial.rows[0].credit_balance, Money::from_cents(1_500));

        assert!(ledger.account("999", None, None).await.is_err());
    }
}
