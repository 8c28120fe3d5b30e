//! Receivables (cuentas por cobrar) and payables (cuentas por pagar).

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::{ok, ApiJson, ApiPath, ApiResult};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::accounts::CreditKind;
use tambo_core::sale::PaymentMethod;
use tambo_core::CreditPayment;
use tambo_db::CreditAccountView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/receivables", get(list_receivables))
        .route("/receivables/{id}/payments", get(payments).post(collect))
        .route("/payables", get(list_payables))
        .route("/payables/{id}/payments", get(payments).post(pay))
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: i64,
    pub method: PaymentMethod,
}

async fn list_receivables(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<CreditAccountView>> {
    ok(state.db.scoped(&auth.scope).accounts().list(CreditKind::Receivable).await?)
}

async fn list_payables(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<CreditAccountView>> {
    ok(state.db.scoped(&auth.scope).accounts().list(CreditKind::Payable).await?)
}

async fn payments(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Vec<CreditPayment>> {
    ok(state.db.scoped(&auth.scope).accounts().payments(&id).await?)
}

async fn collect(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> ApiResult<CreditAccountView> {
    ok(state
        .db
        .scoped(&auth.scope)
        .accounts()
        .collect(&id, req.amount_cents, req.method)
        .await?)
}

async fn pay(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> ApiResult<CreditAccountView> {
    ok(state
        .db
        .scoped(&auth.scope)
        .accounts()
        .pay(&id, req.amount_cents, req.method)
        .await?)
}
