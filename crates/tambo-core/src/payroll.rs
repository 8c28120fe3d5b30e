//! # Payroll Module
//!
//! The payroll period (nómina) state machine and payslip arithmetic.
//!
//! ## Period Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Open ──start_validation──► Validating ──complete──► Validated         │
//! │    ▲                              │                      │              │
//! │    └───────────reopen─────────────┘                      │              │
//! │                                              generate_payments          │
//! │                                                          ▼              │
//! │                                                        Paid             │
//! │                                                                         │
//! │  Attendance, bonuses and deductions are only accepted while Open.      │
//! │  Any other transition is rejected with InvalidTransition.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payslip (30-day commercial month)
//! ```text
//! absences    = salary × absent_days / 30
//! family      = 10% RMV            (only with dependent children)
//! gross       = salary − absences + family + bonuses
//! pension     = ONP 13% × gross
//!             | AFP (10% fund + 1.37% insurance + commission) × gross
//! net         = gross − pension − deductions
//! EsSalud     = 9% × max(gross, RMV)          (employer cost, not withheld)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, TaxRate};
use crate::types::{Employee, Payslip};
use crate::DEFAULT_MINIMUM_WAGE;

// =============================================================================
// Rates
// =============================================================================

pub const COMMERCIAL_MONTH_DAYS: i64 = 30;
pub const ONP_RATE: TaxRate = TaxRate::from_bps(1300);
pub const AFP_FUND_RATE: TaxRate = TaxRate::from_bps(1000);
pub const AFP_INSURANCE_RATE: TaxRate = TaxRate::from_bps(137);
pub const ESSALUD_RATE: TaxRate = TaxRate::from_bps(900);
pub const FAMILY_ALLOWANCE_RATE: TaxRate = TaxRate::from_bps(1000);

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Open,
    Validating,
    Validated,
    Paid,
}

impl PeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Validating => "validating",
            PeriodStatus::Validated => "validated",
            PeriodStatus::Paid => "paid",
        }
    }

    pub fn can_transition_to(&self, next: PeriodStatus) -> bool {
        use PeriodStatus::*;
        matches!(
            (self, next),
            (Open, Validating) | (Validating, Validated) | (Validating, Open) | (Validated, Paid)
        )
    }

    /// Checked transition.
    pub fn transition(self, next: PeriodStatus) -> CoreResult<PeriodStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::transition("payroll period", self, next))
        }
    }

    /// Attendance and adjustments need an open period.
    pub fn ensure_editable(&self) -> CoreResult<()> {
        if *self != PeriodStatus::Open {
            return Err(CoreError::state(
                "payroll period",
                self,
                "attendance and adjustments can only change while open",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    PaidLeave,
}

impl AttendanceStatus {
    /// Only unjustified absences reduce pay.
    pub fn is_unpaid(&self) -> bool {
        matches!(self, AttendanceStatus::Absent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Bonus,
    Deduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PensionSystem {
    Onp,
    Afp,
}

// =============================================================================
// Payslip Computation
// =============================================================================

/// Deployment-wide parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayrollRules {
    /// RMV.
    pub minimum_wage: Money,
}

impl Default for PayrollRules {
    fn default() -> Self {
        PayrollRules {
            minimum_wage: DEFAULT_MINIMUM_WAGE,
        }
    }
}

/// What one employee brings to the period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayslipInput {
    pub monthly_salary: Money,
    pub pension_system: PensionSystem,
    pub afp_commission: TaxRate,
    pub has_dependents: bool,
    pub absence_days: i64,
    pub bonuses: Money,
    pub deductions: Money,
}

impl PayslipInput {
    /// Employee data with no attendance or adjustments yet.
    pub fn for_employee(employee: &Employee) -> Self {
        PayslipInput {
            monthly_salary: Money::from_cents(employee.monthly_salary_cents),
            pension_system: employee.pension_system,
            afp_commission: TaxRate::from_bps(employee.afp_commission_bps),
            has_dependents: employee.has_dependents,
            absence_days: 0,
            bonuses: Money::zero(),
            deductions: Money::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PayslipCalc {
    pub base_salary: Money,
    pub absence_days: i64,
    pub absence_deduction: Money,
    pub family_allowance: Money,
    pub bonuses: Money,
    pub gross: Money,
    pub pension_system: PensionSystem,
    pub pension: Money,
    pub other_deductions: Money,
    pub net: Money,
    pub essalud: Money,
}

/// Pension withholding rate for a system.
pub fn pension_rate(system: PensionSystem, afp_commission: TaxRate) -> TaxRate {
    match system {
        PensionSystem::Onp => ONP_RATE,
        PensionSystem::Afp => AFP_FUND_RATE + AFP_INSURANCE_RATE + afp_commission,
    }
}

/// Computes a payslip.
///
/// A negative net is returned as computed; [`payroll_problems`] reports it.
pub fn compute_payslip(input: &PayslipInput, rules: &PayrollRules) -> CoreResult<PayslipCalc> {
    if !input.monthly_salary.is_positive() {
        return Err(ValidationError::must_be_positive("monthly_salary").into());
    }
    if !(0..=COMMERCIAL_MONTH_DAYS).contains(&input.absence_days) {
        return Err(ValidationError::OutOfRange {
            field: "absence_days".to_string(),
            min: 0,
            max: COMMERCIAL_MONTH_DAYS,
        }
        .into());
    }
    if input.bonuses.is_negative() || input.deductions.is_negative() {
        return Err(ValidationError::must_be_positive("adjustment").into());
    }

    let salary = input.monthly_salary;
    let absence_deduction = (salary * input.absence_days).divide(COMMERCIAL_MONTH_DAYS);

    let family_allowance = if input.has_dependents {
        rules.minimum_wage.percentage(FAMILY_ALLOWANCE_RATE)
    } else {
        Money::zero()
    };

    let gross = salary - absence_deduction + family_allowance + input.bonuses;
    let pension = gross.percentage(pension_rate(input.pension_system, input.afp_commission));
    let net = gross - pension - input.deductions;

    let essalud_base = if gross > rules.minimum_wage {
        gross
    } else {
        rules.minimum_wage
    };

    Ok(PayslipCalc {
        base_salary: salary,
        absence_days: input.absence_days,
        absence_deduction,
        family_allowance,
        bonuses: input.bonuses,
        gross,
        pension_system: input.pension_system,
        pension,
        other_deductions: input.deductions,
        net,
        essalud: essalud_base.percentage(ESSALUD_RATE),
    })
}

impl PayslipCalc {
    /// Figures of a stored payslip.
    pub fn from_payslip(p: &Payslip) -> Self {
        PayslipCalc {
            base_salary: Money::from_cents(p.base_salary_cents),
            absence_days: p.absence_days,
            absence_deduction: Money::from_cents(p.absence_deduction_cents),
            family_allowance: Money::from_cents(p.family_allowance_cents),
            bonuses: Money::from_cents(p.bonuses_cents),
            gross: Money::from_cents(p.gross_cents),
            pension_system: p.pension_system,
            pension: Money::from_cents(p.pension_cents),
            other_deductions: Money::from_cents(p.other_deductions_cents),
            net: Money::from_cents(p.net_cents),
            essalud: Money::from_cents(p.essalud_cents),
        }
    }
}

/// `YYYY-MM` label of a period.
pub fn period_label(year: i64, month: i64) -> String {
    format!("{:04}-{:02}", year, month)
}

/// Reasons a period cannot be validated, one per offending employee.
pub fn payroll_problems(active: &[Employee], payslips: &[Payslip]) -> Vec<String> {
    let mut problems = Vec::new();

    for employee in active {
        match payslips.iter().find(|p| p.employee_id == employee.id) {
            None => problems.push(format!("{}: no payslip", employee.full_name())),
            Some(p) if p.net_cents < 0 => problems.push(format!(
                "{}: negative net pay {}",
                employee.full_name(),
                Money::from_cents(p.net_cents)
            )),
            Some(_) => {}
        }
    }

    problems
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn input(salary: i64, system: PensionSystem) -> PayslipInput {
        PayslipInput {
            monthly_salary: Money::from_cents(salary),
            pension_system: system,
            afp_commission: TaxRate::from_bps(155),
            has_dependents: false,
            absence_days: 0,
            bonuses: Money::zero(),
            deductions: Money::zero(),
        }
    }

    fn employee(id: &str) -> Employee {
        Employee {
            id: id.to_string(),
            company_id: "c".to_string(),
            branch_id: "b".to_string(),
            dni: "45678901".to_string(),
            first_name: "Juan".to_string(),
            last_name: id.to_string(),
            phone: None,
            area_id: None,
            position_id: None,
            monthly_salary_cents: 150_000,
            pension_system: PensionSystem::Onp,
            afp_commission_bps: 0,
            has_dependents: false,
            hired_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn payslip(employee_id: &str, net: i64) -> Payslip {
        Payslip {
            id: format!("ps-{}", employee_id),
            period_id: "p".to_string(),
            employee_id: employee_id.to_string(),
            employee_name: employee_id.to_string(),
            base_salary_cents: 150_000,
            absence_days: 0,
            absence_deduction_cents: 0,
            family_allowance_cents: 0,
            bonuses_cents: 0,
            gross_cents: 150_000,
            pension_system: PensionSystem::Onp,
            pension_cents: 19_500,
            other_deductions_cents: 0,
            net_cents: net,
            essalud_cents: 13_500,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transitions() {
        use PeriodStatus::*;
        assert_eq!(Open.transition(Validating).unwrap(), Validating);
        assert_eq!(Validating.transition(Validated).unwrap(), Validated);
        assert_eq!(Validating.transition(Open).unwrap(), Open);
        assert_eq!(Validated.transition(Paid).unwrap(), Paid);

        for (from, to) in [
            (Open, Validated),
            (Open, Paid),
            (Validating, Paid),
            (Validated, Open),
            (Paid, Open),
            (Paid, Validating),
            (Open, Open),
        ] {
            assert!(
                matches!(from.transition(to), Err(CoreError::InvalidTransition { .. })),
                "{} -> {}",
                from,
                to
            );
        }
    }

    #[test]
    fn test_editable_only_while_open() {
        assert!(PeriodStatus::Open.ensure_editable().is_ok());
        assert!(PeriodStatus::Validating.ensure_editable().is_err());
        assert!(PeriodStatus::Paid.ensure_editable().is_err());
    }

    #[test]
    fn test_onp_payslip() {
        let calc = compute_payslip(&input(150_000, PensionSystem::Onp), &PayrollRules::default())
            .unwrap();
        assert_eq!(calc.gross.cents(), 150_000);
        assert_eq!(calc.pension.cents(), 19_500);
        assert_eq!(calc.net.cents(), 130_500);
        assert_eq!(calc.essalud.cents(), 13_500);
    }

    #[test]
    fn test_afp_payslip_with_family_allowance() {
        let mut i = input(200_000, PensionSystem::Afp);
        i.has_dependents = true;
        let calc = compute_payslip(&i, &PayrollRules::default()).unwrap();

        // 10% of 1,130.00
        assert_eq!(calc.family_allowance.cents(), 11_300);
        assert_eq!(calc.gross.cents(), 211_300);
        // (10% + 1.37% + 1.55%) of 2,113.00 = 273.00
        assert_eq!(calc.pension.cents(), 27_300);
        assert_eq!(calc.net.cents(), 184_000);
    }

    #[test]
    fn test_absences_and_adjustments() {
        let mut i = input(150_000, PensionSystem::Onp);
        i.absence_days = 2;
        i.bonuses = Money::from_cents(10_000);
        i.deductions = Money::from_cents(5_000);
        let calc = compute_payslip(&i, &PayrollRules::default()).unwrap();

        assert_eq!(calc.absence_deduction.cents(), 10_000);
        assert_eq!(calc.gross.cents(), 150_000);
        assert_eq!(calc.net.cents(), 150_000 - 19_500 - 5_000);
    }

    #[test]
    fn test_essalud_floor_is_minimum_wage() {
        let mut i = input(150_000, PensionSystem::Onp);
        i.absence_days = 30;
        let calc = compute_payslip(&i, &PayrollRules::default()).unwrap();
        assert!(calc.gross.is_zero());
        // 9% of 1,130.00
        assert_eq!(calc.essalud.cents(), 10_170);
    }

    #[test]
    fn test_negative_net_is_reported_not_rejected() {
        let mut i = input(113_000, PensionSystem::Onp);
        i.deductions = Money::from_cents(200_000);
        let calc = compute_payslip(&i, &PayrollRules::default()).unwrap();
        assert!(calc.net.is_negative());
    }

    #[test]
    fn test_invalid_input() {
        let rules = PayrollRules::default();
        assert!(compute_payslip(&input(0, PensionSystem::Onp), &rules).is_err());
        let mut i = input(100_000, PensionSystem::Onp);
        i.absence_days = 31;
        assert!(compute_payslip(&i, &rules).is_err());
    }

    #[test]
    fn test_payroll_problems() {
        let active = vec![employee("a"), employee("b"), employee("c")];
        let slips = vec![payslip("a", 130_500), payslip("b", -100)];
        let problems = payroll_problems(&active, &slips);

        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("Juan b"));
        assert!(problems[0].contains("negative"));
        assert!(problems[1].contains("no payslip"));
    }
}
