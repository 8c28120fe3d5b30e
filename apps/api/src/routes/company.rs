//! Company, branches and users of the caller's tenant.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use super::{ok, ApiJson, ApiResult};
use crate::auth::{hash_password, AuthUser};
use crate::AppState;
use tambo_core::validation::validate_password;
use tambo_core::{Branch, Company, Role, User};
use tambo_db::{NewBranch, NewUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/company", get(company))
        .route("/branches", get(list_branches).post(create_branch))
        .route("/users", post(create_user))
}

async fn company(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Company> {
    ok(state.db.companies().get_company(&auth.scope.company_id).await?)
}

async fn list_branches(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Branch>> {
    ok(state.db.companies().list_branches(&auth.scope.company_id).await?)
}

async fn create_branch(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<NewBranch>,
) -> ApiResult<Branch> {
    auth.require_admin()?;
    ok(state.db.companies().create_branch(&auth.scope.company_id, &req).await?)
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Defaults to the caller's branch.
    pub branch_id: Option<String>,
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<User> {
    auth.require_admin()?;
    validate_password(&req.password).map_err(tambo_core::CoreError::from)?;

    let input = NewUser {
        branch_id: req.branch_id.unwrap_or_else(|| auth.scope.branch_id.clone()),
        username: req.username,
        full_name: req.full_name,
        password_hash: hash_password(&req.password)?,
        role: req.role,
    };

    ok(state.db.companies().create_user(&auth.scope.company_id, &input).await?)
}
