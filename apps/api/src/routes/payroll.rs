//! Staff master data and payroll periods (planilla).
//!
//! Every route here needs an administrator or an accountant.

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::NaiveDate;
use serde::Deserialize;

use super::{ok, ApiJson, ApiPath, ApiResult};
use crate::auth::AuthUser;
use crate::AppState;
use tambo_core::payroll::{AdjustmentKind, AttendanceStatus};
use tambo_core::{Area, Employee, PayrollAdjustment, PayrollPayment, PayrollPeriod, Payslip, Position};
use tambo_db::{EmployeeInput, PeriodDetail};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/areas", get(list_areas).post(create_area))
        .route("/positions", get(list_positions).post(create_position))
        .route("/employees", get(list_employees).post(create_employee))
        .route("/employees/{id}", put(update_employee).get(get_employee))
        .route("/employees/{id}/deactivate", post(deactivate_employee))
        .route("/payroll/periods", get(list_periods).post(create_period))
        .route("/payroll/periods/{id}", get(get_period))
        .route("/payroll/periods/{id}/attendance", post(record_attendance))
        .route("/payroll/periods/{id}/adjustments", post(add_adjustment))
        .route("/payroll/periods/{id}/start-validation", post(start_validation))
        .route("/payroll/periods/{id}/complete-validation", post(complete_validation))
        .route("/payroll/periods/{id}/reopen", post(reopen))
        .route("/payroll/periods/{id}/payments", post(generate_payments))
}

// =============================================================================
// Areas, positions, employees
// =============================================================================

async fn list_areas(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Area>> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().list_areas().await?)
}

#[derive(Debug, Deserialize)]
pub struct AreaRequest {
    pub name: String,
}

async fn create_area(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<AreaRequest>,
) -> ApiResult<Area> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().create_area(&req.name).await?)
}

async fn list_positions(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Position>> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().list_positions().await?)
}

#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    pub name: String,
    pub area_id: Option<String>,
}

async fn create_position(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<PositionRequest>,
) -> ApiResult<Position> {
    auth.require_books()?;
    ok(state
        .db
        .scoped(&auth.scope)
        .payroll()
        .create_position(&req.name, req.area_id.as_deref())
        .await?)
}

async fn list_employees(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<Employee>> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().list_employees().await?)
}

async fn get_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Employee> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().get_employee(&id).await?)
}

async fn create_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<EmployeeInput>,
) -> ApiResult<Employee> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().create_employee(&req).await?)
}

async fn update_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<EmployeeInput>,
) -> ApiResult<Employee> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().update_employee(&id, &req).await?)
}

async fn deactivate_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<()> {
    auth.require_books()?;
    state.db.scoped(&auth.scope).payroll().deactivate_employee(&id).await?;
    ok(())
}

// =============================================================================
// Periods
// =============================================================================

async fn list_periods(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Vec<PayrollPeriod>> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().list_periods().await?)
}

#[derive(Debug, Deserialize)]
pub struct PeriodRequest {
    pub year: i64,
    pub month: i64,
}

async fn create_period(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<PeriodRequest>,
) -> ApiResult<PayrollPeriod> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().create_period(req.year, req.month).await?)
}

async fn get_period(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<PeriodDetail> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().get_period(&id).await?)
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub employee_id: String,
    pub work_date: NaiveDate,
    pub status: AttendanceStatus,
}

async fn record_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<AttendanceRequest>,
) -> ApiResult<()> {
    auth.require_books()?;
    state
        .db
        .scoped(&auth.scope)
        .payroll()
        .record_attendance(&id, &req.employee_id, req.work_date, req.status)
        .await?;
    ok(())
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub employee_id: String,
    pub kind: AdjustmentKind,
    pub amount_cents: i64,
    pub description: String,
}

async fn add_adjustment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<AdjustmentRequest>,
) -> ApiResult<PayrollAdjustment> {
    auth.require_books()?;
    ok(state
        .db
        .scoped(&auth.scope)
        .payroll()
        .add_adjustment(&id, &req.employee_id, req.kind, req.amount_cents, &req.description)
        .await?)
}

async fn start_validation(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Vec<Payslip>> {
    auth.require_books()?;
    ok(state
        .db
        .scoped(&auth.scope)
        .payroll()
        .start_validation(&id, &state.rules)
        .await?)
}

async fn complete_validation(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<PayrollPeriod> {
    auth.require_books()?;
    ok(state
        .db
        .scoped(&auth.scope)
        .payroll()
        .complete_validation(&id, &auth.user_id)
        .await?)
}

async fn reopen(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<PayrollPeriod> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().reopen(&id).await?)
}

async fn generate_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Vec<PayrollPayment>> {
    auth.require_books()?;
    ok(state.db.scoped(&auth.scope).payroll().generate_payments(&id).await?)
}
