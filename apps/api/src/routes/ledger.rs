//! Libro diario, mayor and balance de comprobación.

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{ok, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::ledger::{Account, JournalEntryDraft, LedgerAccount, TrialBalance, CHART};
use tambo_db::JournalEntryView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ledger/chart", get(chart))
        .route("/ledger/journal", get(journal).post(post_entry))
        .route("/ledger/accounts/{code}", get(account))
        .route("/ledger/trial-balance", get(trial_balance))
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

async fn chart(_auth: AuthUser) -> ApiResult<&'static [Account]> {
    ok(CHART)
}

async fn journal(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> ApiResult<Vec<JournalEntryView>> {
    ok(state.db.scoped(&auth.scope).ledger().journal(range.from, range.to).await?)
}

/// Manual entry (asiento manual).
async fn post_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(draft): ApiJson<JournalEntryDraft>,
) -> ApiResult<JournalEntryView> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).ledger().post(&draft).await?)
}

async fn account(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(code): ApiPath<String>,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> ApiResult<LedgerAccount> {
    ok(state
        .db
        .scoped(&auth.scope)
        .ledger()
        .account(&code, range.from, range.to)
        .await?)
}

async fn trial_balance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(range): ApiQuery<RangeQuery>,
) -> ApiResult<TrialBalance> {
    ok(state.db.scoped(&auth.scope).ledger().trial_balance(range.to).await?)
}
