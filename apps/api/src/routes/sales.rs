//! Checkout, voids and supplier purchases.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tracing::info;

use super::{clamp_limit, ok, ApiJson, ApiPath, ApiQuery, ApiResult, LimitQuery};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::{Purchase, Sale};
use tambo_db::{CheckoutRequest, PurchaseDetail, PurchaseRequest, SaleDetail};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list).post(checkout))
        .route("/sales/{id}", get(get_sale))
        .route("/sales/{id}/void", post(void))
        .route("/purchases", get(list_purchases).post(record_purchase))
}

/// Venta: items, a table or an online order, paid in one or more tenders.
async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(mut req): ApiJson<CheckoutRequest>,
) -> ApiResult<SaleDetail> {
    req.user_id = auth.user_id.clone();
    let sale = state.db.scoped(&auth.scope).sales().checkout(&req).await?;

    info!(
        sale_id = %sale.sale.id,
        document = %sale.sale.document_number,
        total_cents = sale.sale.total_cents,
        "Sale completed"
    );
    ok(sale)
}

#[derive(Debug, Deserialize)]
pub struct SaleQuery {
    pub session_id: Option<String>,
    pub limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<SaleQuery>,
) -> ApiResult<Vec<Sale>> {
    ok(state
        .db
        .scoped(&auth.scope)
        .sales()
        .list(query.session_id.as_deref(), clamp_limit(query.limit))
        .await?)
}

async fn get_sale(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<SaleDetail> {
    ok(state.db.scoped(&auth.scope).sales().get(&id).await?)
}

async fn void(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<SaleDetail> {
    ok(state.db.scoped(&auth.scope).sales().void(&id, &auth.user_id).await?)
}

async fn record_purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<PurchaseRequest>,
) -> ApiResult<PurchaseDetail> {
    ok(state.db.scoped(&auth.scope).purchases().record(&auth.user_id, &req).await?)
}

async fn list_purchases(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<Purchase>> {
    ok(state.db.scoped(&auth.scope).purchases().list(query.limit()).await?)
}
