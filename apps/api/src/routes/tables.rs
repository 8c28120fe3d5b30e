//! Dining tables and their preventa.

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;

use super::{ok, ApiJson, ApiPath, ApiResult};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::{DiningTable, TableOrder};
use tambo_db::TableOrderView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tables", get(list).post(create))
        .route("/tables/{id}/open", post(open))
        .route("/tables/{id}/order", get(active_order))
        .route("/tables/{id}/order/items", post(add_item))
        .route(
            "/tables/{id}/order/items/{item_id}",
            put(set_quantity).delete(remove_item),
        )
        .route("/tables/{id}/bill", post(request_bill))
        .route("/tables/{id}/reopen", post(reopen))
        .route("/tables/{id}/transfer", post(transfer))
        .route("/tables/{id}/cancel", post(cancel))
}

async fn list(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<DiningTable>> {
    ok(state.db.scoped(&auth.scope).tables().list().await?)
}

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    pub label: String,
    pub capacity: i64,
}

async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateTableRequest>,
) -> ApiResult<DiningTable> {
    ok(state.db.scoped(&auth.scope).tables().create(&req.label, req.capacity).await?)
}

#[derive(Debug, Deserialize)]
pub struct OpenTableRequest {
    pub guests: i64,
}

/// The caller becomes the table's waiter.
async fn open(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<OpenTableRequest>,
) -> ApiResult<TableOrderView> {
    ok(state
        .db
        .scoped(&auth.scope)
        .tables()
        .open(&id, &auth.user_id, req.guests)
        .await?)
}

async fn active_order(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<TableOrderView> {
    ok(state.db.scoped(&auth.scope).tables().active_order(&id).await?)
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: i64,
    pub note: Option<String>,
}

async fn add_item(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> ApiResult<TableOrderView> {
    ok(state
        .db
        .scoped(&auth.scope)
        .tables()
        .add_item(&id, &req.product_id, req.quantity, req.note.as_deref())
        .await?)
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

/// Quantity zero removes the line.
async fn set_quantity(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath((id, item_id)): ApiPath<(String, String)>,
    ApiJson(req): ApiJson<QuantityRequest>,
) -> ApiResult<TableOrderView> {
    ok(state
        .db
        .scoped(&auth.scope)
        .tables()
        .set_item_quantity(&id, &item_id, req.quantity)
        .await?)
}

async fn remove_item(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath((id, item_id)): ApiPath<(String, String)>,
) -> ApiResult<TableOrderView> {
    ok(state.db.scoped(&auth.scope).tables().remove_item(&id, &item_id).await?)
}

async fn request_bill(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<TableOrderView> {
    ok(state.db.scoped(&auth.scope).tables().request_bill(&id).await?)
}

async fn reopen(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<TableOrderView> {
    ok(state.db.scoped(&auth.scope).tables().reopen(&id).await?)
}

#[derive(Debug, Deserialize)]
pub struct TransferTableRequest {
    pub to_table_id: String,
}

async fn transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<TransferTableRequest>,
) -> ApiResult<TableOrderView> {
    ok(state.db.scoped(&auth.scope).tables().transfer(&id, &req.to_table_id).await?)
}

async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<TableOrder> {
    ok(state.db.scoped(&auth.scope).tables().cancel(&id).await?)
}
