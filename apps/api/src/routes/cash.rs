//! Cash registers and sessions (caja).

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use super::{ok, ApiJson, ApiPath, ApiResult};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::cash::CashMovementKind;
use tambo_core::{CashMovement, CashRegister, CashSession};
use tambo_db::SessionView;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cash/registers", get(list_registers).post(create_register))
        .route("/cash/registers/{id}/open", post(open))
        .route("/cash/registers/{id}/session", get(current_session))
        .route("/cash/sessions/{id}", get(get_session))
        .route("/cash/sessions/{id}/movements", post(add_movement))
        .route("/cash/sessions/{id}/close", post(close))
}

async fn list_registers(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<CashRegister>> {
    ok(state.db.scoped(&auth.scope).cash().list_registers().await?)
}

#[derive(Debug, Deserialize)]
pub struct CreateRegisterRequest {
    pub name: String,
}

async fn create_register(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateRegisterRequest>,
) -> ApiResult<CashRegister> {
    auth.require_admin()?;
    ok(state.db.scoped(&auth.scope).cash().create_register(&req.name).await?)
}

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub opening_cents: i64,
}

async fn open(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(register_id): ApiPath<String>,
    ApiJson(req): ApiJson<OpenSessionRequest>,
) -> ApiResult<CashSession> {
    ok(state
        .db
        .scoped(&auth.scope)
        .cash()
        .open(&register_id, &auth.user_id, req.opening_cents)
        .await?)
}

/// The open session of a register, if any.
async fn current_session(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(register_id): ApiPath<String>,
) -> ApiResult<Option<CashSession>> {
    ok(state.db.scoped(&auth.scope).cash().current_session(&register_id).await?)
}

async fn get_session(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<SessionView> {
    ok(state.db.scoped(&auth.scope).cash().get_session(&id).await?)
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub kind: CashMovementKind,
    pub amount_cents: i64,
    pub description: String,
}

async fn add_movement(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(session_id): ApiPath<String>,
    ApiJson(req): ApiJson<MovementRequest>,
) -> ApiResult<CashMovement> {
    ok(state
        .db
        .scoped(&auth.scope)
        .cash()
        .add_movement(&session_id, &auth.user_id, req.kind, req.amount_cents, &req.description)
        .await?)
}

#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    /// Cash physically counted in the drawer.
    pub counted_cents: i64,
}

async fn close(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(session_id): ApiPath<String>,
    ApiJson(req): ApiJson<CloseSessionRequest>,
) -> ApiResult<SessionView> {
    ok(state.db.scoped(&auth.scope).cash().close(&session_id, req.counted_cents).await?)
}
