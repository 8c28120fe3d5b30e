//! Login, current user and health.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ok, ApiJson, ApiResult};
use crate::auth::{verify_password, AuthUser};
use crate::error::ApiError;
use crate::AppState;
use tambo_core::{TenantScope, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/health", get(health))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub ruc: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let rejected = || ApiError::Unauthorized("usuario o contraseña incorrectos".to_string());

    let Some(user) = state.db.companies().find_login(&req.ruc, &req.username).await? else {
        warn!(ruc = %req.ruc, username = %req.username, "Login for unknown user");
        return Err(rejected());
    };

    // argon2 is CPU bound
    let hash = user.password_hash.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password check panicked: {}", e)))?;

    if !valid {
        warn!(user_id = %user.id, "Login with wrong password");
        return Err(rejected());
    }

    let access_token = state.jwt.generate_access_token(&user)?;
    info!(user_id = %user.id, role = ?user.role, "User logged in");

    ok(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.jwt.access_lifetime_secs(),
        user,
    })
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub scope: TenantScope,
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<MeResponse> {
    let user = state
        .db
        .companies()
        .get_user(&auth.scope.company_id, &auth.user_id)
        .await?;
    ok(MeResponse {
        user,
        scope: auth.scope,
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub migrations_total: usize,
    pub migrations_applied: usize,
}

async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    let database = state.db.health_check().await;
    let (total, applied) = state.db.migration_status().await.unwrap_or((0, 0));

    ok(HealthResponse {
        status: if database && total == applied { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        migrations_total: total,
        migrations_applied: applied,
    })
}
