//! # Payroll Repository
//!
//! Staff master data (areas, positions, employees) and monthly payroll
//! periods of a branch.
//!
//! ## Period Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_period ──► Open  ◄── attendance / bonuses / deductions          │
//! │                     │                                                   │
//! │        start_validation   UPDATE ... WHERE status = 'open'              │
//! │                     │     + payslips for every active employee          │
//! │                     ▼                                                   │
//! │                 Validating ──reopen──► Open (payslips dropped)          │
//! │                     │                                                   │
//! │       complete_validation  payroll_problems() must be empty             │
//! │                     ▼                                                   │
//! │                 Validated                                               │
//! │                     │                                                   │
//! │       generate_payments    accrual + payment entry per payslip          │
//! │                     ▼                                                   │
//! │                   Paid                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every status change is a conditional UPDATE checked through
//! `rows_affected`, so two concurrent calls cannot both succeed.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{new_id, today};
use tambo_core::ledger::{payroll_accrual_entry, payroll_payment_entry};
use tambo_core::payroll::{
    compute_payslip, payroll_problems, period_label, AdjustmentKind, AttendanceStatus,
    PayrollRules, PayslipCalc, PayslipInput, PensionSystem, PeriodStatus, COMMERCIAL_MONTH_DAYS,
};
use tambo_core::validation::{validate_dni, validate_name, validate_period, validate_positive_amount};
use tambo_core::{
    Area, AttendanceRecord, CoreError, Employee, Money, PayrollAdjustment, PayrollPayment,
    PayrollPeriod, Payslip, Position, TenantScope, ValidationError,
};

use super::ledger::post_entry;

const EMPLOYEE_COLUMNS: &str = "id, company_id, branch_id, dni, first_name, last_name, phone, \
     area_id, position_id, monthly_salary_cents, pension_system, afp_commission_bps, \
     has_dependents, hired_on, is_active, created_at";
const PERIOD_COLUMNS: &str = "id, company_id, branch_id, year, month, status, \
     validation_started_at, validated_at, validated_by, paid_at, created_at";
const PAYSLIP_COLUMNS: &str = "id, period_id, employee_id, employee_name, base_salary_cents, \
     absence_days, absence_deduction_cents, family_allowance_cents, bonuses_cents, gross_cents, \
     pension_system, pension_cents, other_deductions_cents, net_cents, essalud_cents, created_at";

/// Create/update payload of an employee.
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeInput {
    pub dni: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub area_id: Option<String>,
    pub position_id: Option<String>,
    pub monthly_salary_cents: i64,
    pub pension_system: PensionSystem,
    #[serde(default)]
    pub afp_commission_bps: u32,
    #[serde(default)]
    pub has_dependents: bool,
    pub hired_on: NaiveDate,
}

impl EmployeeInput {
    fn validate(&self) -> DbResult<()> {
        validate_dni(&self.dni)?;
        validate_name("first_name", &self.first_name)?;
        validate_name("last_name", &self.last_name)?;
        validate_positive_amount("monthly_salary_cents", self.monthly_salary_cents)?;
        if self.afp_commission_bps > 500 {
            return Err(ValidationError::OutOfRange {
                field: "afp_commission_bps".to_string(),
                min: 0,
                max: 500,
            }
            .into());
        }
        Ok(())
    }
}

/// A period with everything recorded against it.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodDetail {
    #[serde(flatten)]
    pub period: PayrollPeriod,
    pub attendance: Vec<AttendanceRecord>,
    pub adjustments: Vec<PayrollAdjustment>,
    pub payslips: Vec<Payslip>,
    pub payments: Vec<PayrollPayment>,
}

#[derive(Debug, Clone)]
pub struct PayrollRepository {
    pool: SqlitePool,
    scope: TenantScope,
}

impl PayrollRepository {
    pub fn new(pool: SqlitePool, scope: TenantScope) -> Self {
        PayrollRepository { pool, scope }
    }

    // =========================================================================
    // Areas & positions
    // =========================================================================

    pub async fn list_areas(&self) -> DbResult<Vec<Area>> {
        let areas = sqlx::query_as::<_, Area>(
            "SELECT id, company_id, name FROM areas WHERE company_id = ?1 ORDER BY name",
        )
        .bind(&self.scope.company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(areas)
    }

    pub async fn create_area(&self, name: &str) -> DbResult<Area> {
        validate_name("name", name)?;
        let area = Area {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            name: name.trim().to_string(),
        };

        sqlx::query("INSERT INTO areas (id, company_id, name) VALUES (?1, ?2, ?3)")
            .bind(&area.id)
            .bind(&area.company_id)
            .bind(&area.name)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::duplicate("name", &area.name),
                other => other,
            })?;

        Ok(area)
    }

    pub async fn list_positions(&self) -> DbResult<Vec<Position>> {
        let positions = sqlx::query_as::<_, Position>(
            "SELECT id, company_id, area_id, name FROM positions WHERE company_id = ?1 ORDER BY name",
        )
        .bind(&self.scope.company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    pub async fn create_position(&self, name: &str, area_id: Option<&str>) -> DbResult<Position> {
        validate_name("name", name)?;
        let mut conn = self.pool.acquire().await?;
        if let Some(area_id) = area_id {
            self.ensure_area(&mut conn, area_id).await?;
        }

        let position = Position {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            area_id: area_id.map(str::to_string),
            name: name.trim().to_string(),
        };

        sqlx::query("INSERT INTO positions (id, company_id, area_id, name) VALUES (?1, ?2, ?3, ?4)")
            .bind(&position.id)
            .bind(&position.company_id)
            .bind(&position.area_id)
            .bind(&position.name)
            .execute(&mut *conn)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::duplicate("name", &position.name),
                other => other,
            })?;

        Ok(position)
    }

    async fn ensure_area(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT id FROM areas WHERE id = ?1 AND company_id = ?2")
                .bind(id)
                .bind(&self.scope.company_id)
                .fetch_optional(&mut *conn)
                .await?;
        found.map(|_| ()).ok_or_else(|| DbError::not_found("Area", id))
    }

    async fn ensure_position(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT id FROM positions WHERE id = ?1 AND company_id = ?2")
                .bind(id)
                .bind(&self.scope.company_id)
                .fetch_optional(&mut *conn)
                .await?;
        found.map(|_| ()).ok_or_else(|| DbError::not_found("Position", id))
    }

    // =========================================================================
    // Employees
    // =========================================================================

    /// Active employees of the branch.
    pub async fn list_employees(&self) -> DbResult<Vec<Employee>> {
        let mut conn = self.pool.acquire().await?;
        active_employees(&mut conn, &self.scope).await
    }

    pub async fn get_employee(&self, id: &str) -> DbResult<Employee> {
        let mut conn = self.pool.acquire().await?;
        find_employee(&mut conn, &self.scope, id).await
    }

    pub async fn create_employee(&self, input: &EmployeeInput) -> DbResult<Employee> {
        input.validate()?;
        let mut conn = self.pool.acquire().await?;
        self.check_references(&mut conn, input).await?;

        let employee = Employee {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            dni: input.dni.clone(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            phone: input.phone.clone(),
            area_id: input.area_id.clone(),
            position_id: input.position_id.clone(),
            monthly_salary_cents: input.monthly_salary_cents,
            pension_system: input.pension_system,
            afp_commission_bps: commission_for(input),
            has_dependents: input.has_dependents,
            hired_on: input.hired_on,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO employees ({EMPLOYEE_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ))
        .bind(&employee.id)
        .bind(&employee.company_id)
        .bind(&employee.branch_id)
        .bind(&employee.dni)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.phone)
        .bind(&employee.area_id)
        .bind(&employee.position_id)
        .bind(employee.monthly_salary_cents)
        .bind(employee.pension_system)
        .bind(employee.afp_commission_bps)
        .bind(employee.has_dependents)
        .bind(employee.hired_on)
        .bind(employee.is_active)
        .bind(employee.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("dni", &employee.dni),
            other => other,
        })?;

        info!(employee = %employee.full_name(), "Employee registered");
        Ok(employee)
    }

    pub async fn update_employee(&self, id: &str, input: &EmployeeInput) -> DbResult<Employee> {
        input.validate()?;
        let mut conn = self.pool.acquire().await?;
        find_employee(&mut conn, &self.scope, id).await?;
        self.check_references(&mut conn, input).await?;

        sqlx::query(
            r#"
            UPDATE employees SET
                dni = ?3, first_name = ?4, last_name = ?5, phone = ?6, area_id = ?7,
                position_id = ?8, monthly_salary_cents = ?9, pension_system = ?10,
                afp_commission_bps = ?11, has_dependents = ?12, hired_on = ?13
            WHERE id = ?1 AND company_id = ?2
            "#,
        )
        .bind(id)
        .bind(&self.scope.company_id)
        .bind(&input.dni)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(&input.phone)
        .bind(&input.area_id)
        .bind(&input.position_id)
        .bind(input.monthly_salary_cents)
        .bind(input.pension_system)
        .bind(commission_for(input))
        .bind(input.has_dependents)
        .bind(input.hired_on)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("dni", &input.dni),
            other => other,
        })?;

        find_employee(&mut conn, &self.scope, id).await
    }

    /// Cese: the employee leaves future payrolls.
    pub async fn deactivate_employee(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE employees SET is_active = 0 WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3",
        )
        .bind(id)
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Employee", id));
        }
        Ok(())
    }

    async fn check_references(
        &self,
        conn: &mut SqliteConnection,
        input: &EmployeeInput,
    ) -> DbResult<()> {
        if let Some(area_id) = &input.area_id {
            self.ensure_area(conn, area_id).await?;
        }
        if let Some(position_id) = &input.position_id {
            self.ensure_position(conn, position_id).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Periods
    // =========================================================================

    pub async fn create_period(&self, year: i64, month: i64) -> DbResult<PayrollPeriod> {
        validate_period(year, month)?;

        let period = PayrollPeriod {
            id: new_id(),
            company_id: self.scope.company_id.clone(),
            branch_id: self.scope.branch_id.clone(),
            year,
            month,
            status: PeriodStatus::Open,
            validation_started_at: None,
            validated_at: None,
            validated_by: None,
            paid_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(&format!(
            "INSERT INTO payroll_periods ({PERIOD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ))
        .bind(&period.id)
        .bind(&period.company_id)
        .bind(&period.branch_id)
        .bind(period.year)
        .bind(period.month)
        .bind(period.status)
        .bind(period.validation_started_at)
        .bind(period.validated_at)
        .bind(&period.validated_by)
        .bind(period.paid_at)
        .bind(period.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("period", period_label(year, month)),
            other => other,
        })?;

        info!(period = %period_label(year, month), "Payroll period created");
        Ok(period)
    }

    pub async fn list_periods(&self) -> DbResult<Vec<PayrollPeriod>> {
        let periods = sqlx::query_as::<_, PayrollPeriod>(&format!(
            "SELECT {PERIOD_COLUMNS} FROM payroll_periods \
             WHERE company_id = ?1 AND branch_id = ?2 ORDER BY year DESC, month DESC"
        ))
        .bind(&self.scope.company_id)
        .bind(&self.scope.branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(periods)
    }

    pub async fn get_period(&self, id: &str) -> DbResult<PeriodDetail> {
        let mut conn = self.pool.acquire().await?;
        let period = find_period(&mut conn, &self.scope, id).await?;

        let attendance = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT id, period_id, employee_id, work_date, status FROM payroll_attendance \
             WHERE period_id = ?1 ORDER BY work_date, employee_id",
        )
        .bind(&period.id)
        .fetch_all(&mut *conn)
        .await?;

        let adjustments = sqlx::query_as::<_, PayrollAdjustment>(
            "SELECT id, period_id, employee_id, kind, amount_cents, description \
             FROM payroll_adjustments WHERE period_id = ?1 ORDER BY rowid",
        )
        .bind(&period.id)
        .fetch_all(&mut *conn)
        .await?;

        let payslips = period_payslips(&mut conn, &period.id).await?;

        let payments = sqlx::query_as::<_, PayrollPayment>(
            "SELECT id, period_id, employee_id, payslip_id, amount_cents, accrual_entry_id, \
             payment_entry_id, paid_at FROM payroll_payments WHERE period_id = ?1 ORDER BY rowid",
        )
        .bind(&period.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(PeriodDetail {
            period,
            attendance,
            adjustments,
            payslips,
            payments,
        })
    }

    /// Records (or corrects) one day of attendance.
    pub async fn record_attendance(
        &self,
        period_id: &str,
        employee_id: &str,
        work_date: NaiveDate,
        status: AttendanceStatus,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let period = find_period(&mut tx, &self.scope, period_id).await?;
        period.status.ensure_editable()?;
        find_employee(&mut tx, &self.scope, employee_id).await?;

        if i64::from(work_date.year()) != period.year || i64::from(work_date.month()) != period.month {
            return Err(ValidationError::invalid_format(
                "work_date",
                format!("must fall in {}", period_label(period.year, period.month)),
            )
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO payroll_attendance (id, period_id, employee_id, work_date, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (period_id, employee_id, work_date) DO UPDATE SET status = excluded.status
            "#,
        )
        .bind(new_id())
        .bind(&period.id)
        .bind(employee_id)
        .bind(work_date)
        .bind(status)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Adds a bonus or a deduction for the period.
    pub async fn add_adjustment(
        &self,
        period_id: &str,
        employee_id: &str,
        kind: AdjustmentKind,
        amount_cents: i64,
        description: &str,
    ) -> DbResult<PayrollAdjustment> {
        validate_positive_amount("amount_cents", amount_cents)?;
        validate_name("description", description)?;

        let mut tx = self.pool.begin().await?;

        let period = find_period(&mut tx, &self.scope, period_id).await?;
        period.status.ensure_editable()?;
        find_employee(&mut tx, &self.scope, employee_id).await?;

        let adjustment = PayrollAdjustment {
            id: new_id(),
            period_id: period.id.clone(),
            employee_id: employee_id.to_string(),
            kind,
            amount_cents,
            description: description.trim().to_string(),
        };

        sqlx::query(
            "INSERT INTO payroll_adjustments (id, period_id, employee_id, kind, amount_cents, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&adjustment.id)
        .bind(&adjustment.period_id)
        .bind(&adjustment.employee_id)
        .bind(adjustment.kind)
        .bind(adjustment.amount_cents)
        .bind(&adjustment.description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(adjustment)
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Open → Validating; (re)computes the payslip of every active employee.
    pub async fn start_validation(&self, id: &str, rules: &PayrollRules) -> DbResult<Vec<Payslip>> {
        let mut tx = self.pool.begin().await?;

        let period = find_period(&mut tx, &self.scope, id).await?;
        move_period(&mut tx, &period, PeriodStatus::Validating, "validation_started_at = ?3", None).await?;

        sqlx::query("DELETE FROM payslips WHERE period_id = ?1")
            .bind(&period.id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        let mut payslips = Vec::new();
        for employee in active_employees(&mut tx, &self.scope).await? {
            let input = employee_input(&mut tx, &period.id, &employee).await?;
            let calc = compute_payslip(&input, rules)?;
            let payslip = payslip_row(&period.id, &employee, &calc, now);
            insert_payslip(&mut tx, &payslip).await?;
            payslips.push(payslip);
        }

        tx.commit().await?;

        info!(
            period = %period_label(period.year, period.month),
            payslips = payslips.len(),
            "Payroll validation started"
        );
        Ok(payslips)
    }

    /// Validating → Validated, once every active employee has a sound payslip.
    pub async fn complete_validation(&self, id: &str, user_id: &str) -> DbResult<PayrollPeriod> {
        let mut tx = self.pool.begin().await?;

        let period = find_period(&mut tx, &self.scope, id).await?;
        period.status.transition(PeriodStatus::Validated)?;

        let employees = active_employees(&mut tx, &self.scope).await?;
        let payslips = period_payslips(&mut tx, &period.id).await?;
        let problems = payroll_problems(&employees, &payslips);
        if !problems.is_empty() {
            warn!(period_id = %id, count = problems.len(), "Payroll validation incomplete");
            return Err(CoreError::PayrollIncomplete(problems).into());
        }

        move_period(
            &mut tx,
            &period,
            PeriodStatus::Validated,
            "validated_at = ?3, validated_by = ?4",
            Some(user_id),
        )
        .await?;
        let updated = find_period(&mut tx, &self.scope, id).await?;
        tx.commit().await?;

        info!(period = %period_label(period.year, period.month), "Payroll validated");
        Ok(updated)
    }

    /// Validating → Open; draft payslips are dropped.
    pub async fn reopen(&self, id: &str) -> DbResult<PayrollPeriod> {
        let mut tx = self.pool.begin().await?;

        let period = find_period(&mut tx, &self.scope, id).await?;
        move_period(&mut tx, &period, PeriodStatus::Open, "validation_started_at = NULL", None).await?;
        sqlx::query("DELETE FROM payslips WHERE period_id = ?1")
            .bind(&period.id)
            .execute(&mut *tx)
            .await?;

        let updated = find_period(&mut tx, &self.scope, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Validated → Paid; books and pays every payslip.
    pub async fn generate_payments(&self, id: &str) -> DbResult<Vec<PayrollPayment>> {
        let mut tx = self.pool.begin().await?;

        let period = find_period(&mut tx, &self.scope, id).await?;
        move_period(&mut tx, &period, PeriodStatus::Paid, "paid_at = ?3", None).await?;

        let label = period_label(period.year, period.month);
        let date = today();
        let now = Utc::now();
        let mut payments = Vec::new();

        for payslip in period_payslips(&mut tx, &period.id).await? {
            let calc = PayslipCalc::from_payslip(&payslip);
            let source = format!("payroll:{}:{}", period.id, payslip.employee_id);

            let accrual = post_entry(
                &mut tx,
                &self.scope,
                &payroll_accrual_entry(date, &payslip.employee_name, &label, &calc)
                    .with_source(&source),
            )
            .await?;

            let payment_entry = if calc.net.is_positive() {
                let entry = post_entry(
                    &mut tx,
                    &self.scope,
                    &payroll_payment_entry(date, &payslip.employee_name, &label, calc.net)
                        .with_source(&source),
                )
                .await?;
                Some(entry.id)
            } else {
                None
            };

            let payment = PayrollPayment {
                id: new_id(),
                period_id: period.id.clone(),
                employee_id: payslip.employee_id.clone(),
                payslip_id: payslip.id.clone(),
                amount_cents: calc.net.cents(),
                accrual_entry_id: accrual.id,
                payment_entry_id: payment_entry,
                paid_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO payroll_payments (
                    id, period_id, employee_id, payslip_id, amount_cents,
                    accrual_entry_id, payment_entry_id, paid_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&payment.id)
            .bind(&payment.period_id)
            .bind(&payment.employee_id)
            .bind(&payment.payslip_id)
            .bind(payment.amount_cents)
            .bind(&payment.accrual_entry_id)
            .bind(&payment.payment_entry_id)
            .bind(payment.paid_at)
            .execute(&mut *tx)
            .await?;

            payments.push(payment);
        }

        tx.commit().await?;

        let total: Money = payments.iter().map(|p| Money::from_cents(p.amount_cents)).sum();
        info!(period = %label, employees = payments.len(), total = %total, "Payroll paid");
        Ok(payments)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// ONP affiliates carry no AFP commission.
fn commission_for(input: &EmployeeInput) -> u32 {
    match input.pension_system {
        PensionSystem::Onp => 0,
        PensionSystem::Afp => input.afp_commission_bps,
    }
}

async fn find_employee(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<Employee> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3"
    ))
    .bind(id)
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Employee", id))
}

async fn active_employees(conn: &mut SqliteConnection, scope: &TenantScope) -> DbResult<Vec<Employee>> {
    let employees = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees \
         WHERE company_id = ?1 AND branch_id = ?2 AND is_active = 1 ORDER BY last_name, first_name"
    ))
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(employees)
}

async fn find_period(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    id: &str,
) -> DbResult<PayrollPeriod> {
    sqlx::query_as::<_, PayrollPeriod>(&format!(
        "SELECT {PERIOD_COLUMNS} FROM payroll_periods WHERE id = ?1 AND company_id = ?2 AND branch_id = ?3"
    ))
    .bind(id)
    .bind(&scope.company_id)
    .bind(&scope.branch_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Payroll period", id))
}

async fn period_payslips(conn: &mut SqliteConnection, period_id: &str) -> DbResult<Vec<Payslip>> {
    let payslips = sqlx::query_as::<_, Payslip>(&format!(
        "SELECT {PAYSLIP_COLUMNS} FROM payslips WHERE period_id = ?1 ORDER BY employee_name"
    ))
    .bind(period_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(payslips)
}

/// Applies a checked transition with a conditional UPDATE.
///
/// `set` adds column assignments; `?3` is bound to now and `?4` to `by`.
async fn move_period(
    conn: &mut SqliteConnection,
    period: &PayrollPeriod,
    next: PeriodStatus,
    set: &str,
    by: Option<&str>,
) -> DbResult<()> {
    let current = period.status;
    current.transition(next)?;

    let result = sqlx::query(&format!(
        "UPDATE payroll_periods SET status = ?2, {set} WHERE id = ?1 AND status = ?5"
    ))
    .bind(&period.id)
    .bind(next)
    .bind(Utc::now())
    .bind(by)
    .bind(current)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::transition("payroll period", current, next).into());
    }
    Ok(())
}

/// Attendance and adjustments of one employee folded into a payslip input.
async fn employee_input(
    conn: &mut SqliteConnection,
    period_id: &str,
    employee: &Employee,
) -> DbResult<PayslipInput> {
    let absences: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payroll_attendance WHERE period_id = ?1 AND employee_id = ?2 AND status = ?3",
    )
    .bind(period_id)
    .bind(&employee.id)
    .bind(AttendanceStatus::Absent)
    .fetch_one(&mut *conn)
    .await?;

    let (bonuses, deductions): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN kind = 'bonus' THEN amount_cents END), 0),
            COALESCE(SUM(CASE WHEN kind = 'deduction' THEN amount_cents END), 0)
        FROM payroll_adjustments
        WHERE period_id = ?1 AND employee_id = ?2
        "#,
    )
    .bind(period_id)
    .bind(&employee.id)
    .fetch_one(&mut *conn)
    .await?;

    let mut input = PayslipInput::for_employee(employee);
    input.absence_days = absences.min(COMMERCIAL_MONTH_DAYS);
    input.bonuses = Money::from_cents(bonuses);
    input.deductions = Money::from_cents(deductions);
    Ok(input)
}

fn payslip_row(
    period_id: &str,
    employee: &Employee,
    calc: &PayslipCalc,
    created_at: chrono::DateTime<Utc>,
) -> Payslip {
    Payslip {
        id: new_id(),
        period_id: period_id.to_string(),
        employee_id: employee.id.clone(),
        employee_name: employee.full_name(),
        base_salary_cents: calc.base_salary.cents(),
        absence_days: calc.absence_days,
        absence_deduction_cents: calc.absence_deduction.cents(),
        family_allowance_cents: calc.family_allowance.cents(),
        bonuses_cents: calc.bonuses.cents(),
        gross_cents: calc.gross.cents(),
        pension_system: calc.pension_system,
        pension_cents: calc.pension.cents(),
        other_deductions_cents: calc.other_deductions.cents(),
        net_cents: calc.net.cents(),
        essalud_cents: calc.essalud.cents(),
        created_at,
    }
}

async fn insert_payslip(conn: &mut SqliteConnection, p: &Payslip) -> DbResult<()> {
    sqlx::query(&format!(
        "INSERT INTO payslips ({PAYSLIP_COLUMNS}) VALUES \
         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    ))
    .bind(&p.id)
    .bind(&p.period_id)
    .bind(&p.employee_id)
    .bind(&p.employee_name)
    .bind(p.base_salary_cents)
    .bind(p.absence_days)
    .bind(p.absence_deduction_cents)
    .bind(p.family_allowance_cents)
    .bind(p.bonuses_cents)
    .bind(p.gross_cents)
    .bind(p.pension_system)
    .bind(p.pension_cents)
    .bind(p.other_deductions_cents)
    .bind(p.net_cents)
    .bind(p.essalud_cents)
    .bind(p.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    fn staff(dni: &str, last_name: &str, salary: i64, system: PensionSystem) -> EmployeeInput {
        EmployeeInput {
            dni: dni.to_string(),
            first_name: "Ana".to_string(),
            last_name: last_name.to_string(),
            phone: None,
            area_id: None,
            position_id: None,
            monthly_salary_cents: salary,
            pension_system: system,
            afp_commission_bps: 155,
            has_dependents: false,
            hired_on: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_full_period_cycle() {
        let fx = fixture().await;
        let scoped = fx.db.scoped(&fx.scope);
        let payroll = scoped.payroll();

        let cook = payroll
            .create_employee(&staff("45678901", "Cocinera", 150_000, PensionSystem::Onp))
            .await
            .unwrap();
        payroll
            .create_employee(&staff("45678902", "Mozo", 200_000, PensionSystem::Afp))
            .await
            .unwrap();
        assert_eq!(cook.afp_commission_bps, 0);

        let period = payroll.create_period(2026, 10).await.unwrap();
        payroll
            .record_attendance(&period.id, &cook.id, day(5), AttendanceStatus::Absent)
            .await
            .unwrap();
        payroll
            .record_attendance(&period.id, &cook.id, day(6), AttendanceStatus::Absent)
            .await
            .unwrap();
        payroll
            .record_attendance(&period.id, &cook.id, day(7), AttendanceStatus::PaidLeave)
            .await
            .unwrap();

        let payslips = payroll.start_validation(&period.id, &PayrollRules::default()).await.unwrap();
        assert_eq!(payslips.len(), 2);
        let cook_slip = payslips.iter().find(|p| p.employee_id == cook.id).unwrap();
        assert_eq!(cook_slip.absence_days, 2);
        assert_eq!(cook_slip.gross_cents, 140_000);
        assert_eq!(cook_slip.pension_cents, 18_200);
        assert_eq!(cook_slip.net_cents, 121_800);

        // Second start on the same period fails
        let err = payroll
            .start_validation(&period.id, &PayrollRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidTransition { .. })));

        // Attendance is frozen outside Open
        assert!(payroll
            .record_attendance(&period.id, &cook.id, day(8), AttendanceStatus::Absent)
            .await
            .is_err());

        payroll.complete_validation(&period.id, &fx.user_id).await.unwrap();
        let payments = payroll.generate_payments(&period.id).await.unwrap();
        assert_eq!(payments.len(), 2);
        assert!(payments.iter().all(|p| p.payment_entry_id.is_some()));

        let detail = payroll.get_period(&period.id).await.unwrap();
        assert_eq!(detail.period.status, PeriodStatus::Paid);
        assert_eq!(detail.payments.len(), 2);

        let trial = scoped.ledger().trial_balance(None).await.unwrap();
        assert!(trial.is_balanced);
    }

    #[tokio::test]
    async fn test_complete_validation_reports_missing_payslip() {
        let fx = fixture().await;
        let payroll = fx.db.scoped(&fx.scope).payroll();

        payroll
            .create_employee(&staff("45678901", "Cajera", 150_000, PensionSystem::Onp))
            .await
            .unwrap();
        let period = payroll.create_period(2026, 9).await.unwrap();
        payroll.start_validation(&period.id, &PayrollRules::default()).await.unwrap();

        // Hired after the payslips were computed
        payroll
            .create_employee(&staff("45678903", "Nuevo", 120_000, PensionSystem::Onp))
            .await
            .unwrap();

        let err = payroll.complete_validation(&period.id, &fx.user_id).await.unwrap_err();
        match err {
            DbError::Core(CoreError::PayrollIncomplete(problems)) => {
                assert_eq!(problems.len(), 1);
                assert!(problems[0].contains("Nuevo"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let reopened = payroll.reopen(&period.id).await.unwrap();
        assert_eq!(reopened.status, PeriodStatus::Open);
        assert!(payroll.get_period(&period.id).await.unwrap().payslips.is_empty());
    }

    #[tokio::test]
    async fn test_adjustment_and_period_rules() {
        let fx = fixture().await;
        let payroll = fx.db.scoped(&fx.scope).payroll();
        let emp = payroll
            .create_employee(&staff("45678901", "Barista", 150_000, PensionSystem::Onp))
            .await
            .unwrap();
        let period = payroll.create_period(2026, 10).await.unwrap();

        assert!(payroll.create_period(2026, 10).await.unwrap_err().is_unique_violation());
        assert!(payroll
            .record_attendance(
                &period.id,
                &emp.id,
                NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
                AttendanceStatus::Present
            )
            .await
            .is_err());

        payroll
            .add_adjustment(&period.id, &emp.id, AdjustmentKind::Bonus, 10_000, "Horas extra")
            .await
            .unwrap();
        payroll
            .add_adjustment(&period.id, &emp.id, AdjustmentKind::Deduction, 5_000, "Adelanto")
            .await
            .unwrap();

        let slips = payroll.start_validation(&period.id, &PayrollRules::default()).await.unwrap();
        // gross 160_000, ONP 20_800, net 160_000 - 20_800 - 5_000
        assert_eq!(slips[0].gross_cents, 160_000);
        assert_eq!(slips[0].net_cents, 134_200);
    }
}
