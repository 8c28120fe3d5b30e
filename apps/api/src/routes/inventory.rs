//! Catalog, warehouses, stock and kardex.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use super::{clamp_limit, ok, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::{KardexEntry, Product, StockRow, Warehouse};
use tambo_db::{AdjustRequest, NewProduct, ProductUpdate, TransferRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product).put(update_product))
        .route("/products/{id}/deactivate", post(deactivate_product))
        .route("/warehouses", get(list_warehouses).post(create_warehouse))
        .route("/inventory/stock", get(stock))
        .route("/inventory/kardex/{product_id}", get(kardex))
        .route("/inventory/adjust", post(adjust))
        .route("/inventory/transfer", post(transfer))
        .route("/inventory/waste", post(waste))
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

async fn list_products(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> ApiResult<Vec<Product>> {
    let products = state
        .db
        .scoped(&auth.scope)
        .products()
        .list(query.q.as_deref(), clamp_limit(query.limit))
        .await?;
    ok(products)
}

/// Product plus its opening stock in the branch's main warehouse.
async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<NewProduct>,
) -> ApiResult<Product> {
    ok(state.db.scoped(&auth.scope).inventory().create_product_with_stock(&req).await?)
}

async fn get_product(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Product> {
    ok(state.db.scoped(&auth.scope).products().get(&id).await?)
}

async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(changes): ApiJson<ProductUpdate>,
) -> ApiResult<Product> {
    ok(state.db.scoped(&auth.scope).products().update(&id, &changes).await?)
}

async fn deactivate_product(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<()> {
    state.db.scoped(&auth.scope).products().deactivate(&id).await?;
    ok(())
}

async fn list_warehouses(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Warehouse>> {
    ok(state.db.scoped(&auth.scope).inventory().list_warehouses().await?)
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

async fn create_warehouse(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<NameRequest>,
) -> ApiResult<Warehouse> {
    ok(state.db.scoped(&auth.scope).inventory().create_warehouse(&req.name).await?)
}

#[derive(Debug, Deserialize)]
pub struct WarehouseQuery {
    pub warehouse_id: Option<String>,
}

async fn stock(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<WarehouseQuery>,
) -> ApiResult<Vec<StockRow>> {
    ok(state
        .db
        .scoped(&auth.scope)
        .inventory()
        .stock(query.warehouse_id.as_deref())
        .await?)
}

async fn kardex(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(product_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<WarehouseQuery>,
) -> ApiResult<Vec<KardexEntry>> {
    ok(state
        .db
        .scoped(&auth.scope)
        .inventory()
        .kardex(&product_id, query.warehouse_id.as_deref())
        .await?)
}

/// Physical count; `data` is null when the count matched.
async fn adjust(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<AdjustRequest>,
) -> ApiResult<Option<KardexEntry>> {
    ok(state.db.scoped(&auth.scope).inventory().adjust(&req).await?)
}

/// Returns the exit and entry rows.
async fn transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<TransferRequest>,
) -> ApiResult<[KardexEntry; 2]> {
    let (exit, entry) = state.db.scoped(&auth.scope).inventory().transfer(&req).await?;
    ok([exit, entry])
}

#[derive(Debug, Deserialize)]
pub struct WasteRequest {
    pub product_id: String,
    pub quantity: i64,
    pub warehouse_id: Option<String>,
}

async fn waste(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<WasteRequest>,
) -> ApiResult<KardexEntry> {
    ok(state
        .db
        .scoped(&auth.scope)
        .inventory()
        .record_waste(&req.product_id, req.quantity, req.warehouse_id.as_deref())
        .await?)
}
