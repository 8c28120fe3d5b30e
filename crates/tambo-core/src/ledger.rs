//! # Ledger Module
//!
//! Double-entry bookkeeping: the chart of accounts in use, journal entry
//! drafts, the posting templates every workflow uses, the mayor (ledger per
//! account) and the trial balance.
//!
//! ## Posting Templates
//! ```text
//! ┌──────────────────────┬──────────────────────────┬─────────────────────────┐
//! │ Event                │ Debit                    │ Credit                  │
//! ├──────────────────────┼──────────────────────────┼─────────────────────────┤
//! │ Sale                 │ 101 / 104 / 121          │ 701 base, 4011 IGV      │
//! │ Sale void            │ mirror of the sale entry                           │
//! │ Cost of sale         │ 691                      │ 201                     │
//! │ Purchase             │ 201 base, 4011 IGV       │ 101 / 104 / 421         │
//! │ Receivable collected │ 101 / 104                │ 121                     │
//! │ Payable paid         │ 421                      │ 101 / 104               │
//! │ Payroll accrual      │ 621 gross, 627 EsSalud   │ 4031, 4032/417, 141, 411│
//! │ Payroll payment      │ 411                      │ 104                     │
//! └──────────────────────┴──────────────────────────┴─────────────────────────┘
//! ```
//! Every template produces a draft that passes [`JournalEntryDraft::validate`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::payroll::{PayslipCalc, PensionSystem};
use crate::sale::PaymentMethod;

// =============================================================================
// Chart of Accounts
// =============================================================================

/// PCGE account codes used by the posting templates.
pub mod accounts {
    pub const CASH: &str = "101";
    pub const BANK: &str = "104";
    pub const RECEIVABLES: &str = "121";
    pub const STAFF_RECEIVABLES: &str = "141";
    pub const MERCHANDISE: &str = "201";
    pub const IGV: &str = "4011";
    pub const ESSALUD: &str = "4031";
    pub const ONP: &str = "4032";
    pub const SALARIES_PAYABLE: &str = "411";
    pub const AFP: &str = "417";
    pub const PAYABLES: &str = "421";
    pub const PURCHASES: &str = "601";
    pub const SALARIES: &str = "621";
    pub const SOCIAL_SECURITY: &str = "627";
    pub const COST_OF_SALES: &str = "691";
    pub const SALES: &str = "701";
}

/// Side on which an account's balance grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Nature {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Account {
    pub code: &'static str,
    pub name: &'static str,
    pub nature: Nature,
}

const fn account(code: &'static str, name: &'static str, nature: Nature) -> Account {
    Account { code, name, nature }
}

pub const CHART: &[Account] = &[
    account(accounts::CASH, "Caja", Nature::Debit),
    account(accounts::BANK, "Cuentas corrientes en instituciones financieras", Nature::Debit),
    account(accounts::RECEIVABLES, "Cuentas por cobrar comerciales", Nature::Debit),
    account(accounts::STAFF_RECEIVABLES, "Cuentas por cobrar al personal", Nature::Debit),
    account(accounts::MERCHANDISE, "Mercaderías", Nature::Debit),
    account(accounts::IGV, "IGV", Nature::Credit),
    account(accounts::ESSALUD, "EsSalud", Nature::Credit),
    account(accounts::ONP, "ONP", Nature::Credit),
    account(accounts::SALARIES_PAYABLE, "Remuneraciones por pagar", Nature::Credit),
    account(accounts::AFP, "Administradoras de fondos de pensiones", Nature::Credit),
    account(accounts::PAYABLES, "Facturas por pagar", Nature::Credit),
    account(accounts::PURCHASES, "Compras de mercaderías", Nature::Debit),
    account(accounts::SALARIES, "Remuneraciones", Nature::Debit),
    account(accounts::SOCIAL_SECURITY, "Seguridad social", Nature::Debit),
    account(accounts::COST_OF_SALES, "Costo de ventas", Nature::Debit),
    account(accounts::SALES, "Ventas", Nature::Credit),
];

pub fn find_account(code: &str) -> Option<&'static Account> {
    CHART.iter().find(|a| a.code == code)
}

// =============================================================================
// Journal Entry Drafts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JournalLineDraft {
    pub account_code: String,
    pub debit: Money,
    pub credit: Money,
    pub memo: Option<String>,
}

/// An entry before it is numbered and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JournalEntryDraft {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub description: String,
    pub source: Option<String>,
    pub lines: Vec<JournalLineDraft>,
}

impl JournalEntryDraft {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        JournalEntryDraft {
            date,
            description: description.into(),
            source: None,
            lines: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a debit line; zero amounts are skipped.
    pub fn debit(mut self, code: &str, amount: Money) -> Self {
        if !amount.is_zero() {
            self.lines.push(JournalLineDraft {
                account_code: code.to_string(),
                debit: amount,
                credit: Money::zero(),
                memo: None,
            });
        }
        self
    }

    /// Adds a credit line; zero amounts are skipped.
    pub fn credit(mut self, code: &str, amount: Money) -> Self {
        if !amount.is_zero() {
            self.lines.push(JournalLineDraft {
                account_code: code.to_string(),
                debit: Money::zero(),
                credit: amount,
                memo: None,
            });
        }
        self
    }

    pub fn total_debit(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Checks the double-entry invariants.
    ///
    /// ## Rules
    /// - At least two lines
    /// - Every line uses a known account and has exactly one positive side
    /// - Σ debit == Σ credit > 0
    pub fn validate(&self) -> CoreResult<()> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::required("description").into());
        }

        if self.lines.len() < 2 {
            return Err(ValidationError::invalid_format(
                "lines",
                "an entry needs at least two lines",
            )
            .into());
        }

        for line in &self.lines {
            if find_account(&line.account_code).is_none() {
                return Err(ValidationError::invalid_format(
                    "account_code",
                    format!("unknown account {}", line.account_code),
                )
                .into());
            }

            let one_sided = (line.debit.is_positive() && line.credit.is_zero())
                || (line.credit.is_positive() && line.debit.is_zero());
            if !one_sided {
                return Err(ValidationError::invalid_format(
                    "lines",
                    format!("line on {} must carry one positive side", line.account_code),
                )
                .into());
            }
        }

        let debit = self.total_debit();
        let credit = self.total_credit();
        if debit != credit || debit.is_zero() {
            return Err(CoreError::UnbalancedEntry {
                debit: debit.cents(),
                credit: credit.cents(),
            });
        }

        Ok(())
    }

    /// The same entry with debits and credits swapped.
    pub fn mirror(&self, date: NaiveDate, description: impl Into<String>) -> Self {
        JournalEntryDraft {
            date,
            description: description.into(),
            source: self.source.clone(),
            lines: self
                .lines
                .iter()
                .map(|l| JournalLineDraft {
                    account_code: l.account_code.clone(),
                    debit: l.credit,
                    credit: l.debit,
                    memo: l.memo.clone(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// Posting Templates
// =============================================================================

/// Amounts of a sale as they hit the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SalePosting {
    pub cash: Money,
    pub bank: Money,
    pub receivable: Money,
    pub taxable: Money,
    pub igv: Money,
}

pub fn sale_entry(date: NaiveDate, document_number: &str, p: &SalePosting) -> JournalEntryDraft {
    JournalEntryDraft::new(date, format!("Venta {}", document_number))
        .debit(accounts::CASH, p.cash)
        .debit(accounts::BANK, p.bank)
        .debit(accounts::RECEIVABLES, p.receivable)
        .credit(accounts::SALES, p.taxable)
        .credit(accounts::IGV, p.igv)
}

/// `None` when nothing left the warehouse at a cost.
pub fn cost_of_sale_entry(
    date: NaiveDate,
    document_number: &str,
    cost: Money,
) -> Option<JournalEntryDraft> {
    if !cost.is_positive() {
        return None;
    }
    Some(
        JournalEntryDraft::new(date, format!("Costo de venta {}", document_number))
            .debit(accounts::COST_OF_SALES, cost)
            .credit(accounts::MERCHANDISE, cost),
    )
}

/// `settle_account` is 101/104 for cash purchases, 421 on credit.
pub fn purchase_entry(
    date: NaiveDate,
    document_number: &str,
    taxable: Money,
    igv: Money,
    settle_account: &str,
) -> JournalEntryDraft {
    JournalEntryDraft::new(date, format!("Compra {}", document_number))
        .debit(accounts::MERCHANDISE, taxable)
        .debit(accounts::IGV, igv)
        .credit(settle_account, taxable + igv)
}

pub fn collection_entry(
    date: NaiveDate,
    description: impl Into<String>,
    method: PaymentMethod,
    amount: Money,
) -> JournalEntryDraft {
    JournalEntryDraft::new(date, description)
        .debit(method.ledger_account(), amount)
        .credit(accounts::RECEIVABLES, amount)
}

pub fn payable_payment_entry(
    date: NaiveDate,
    description: impl Into<String>,
    method: PaymentMethod,
    amount: Money,
) -> JournalEntryDraft {
    JournalEntryDraft::new(date, description)
        .debit(accounts::PAYABLES, amount)
        .credit(method.ledger_account(), amount)
}

/// Recognizes the salary expense and what is owed to whom.
pub fn payroll_accrual_entry(
    date: NaiveDate,
    employee_name: &str,
    period: &str,
    calc: &PayslipCalc,
) -> JournalEntryDraft {
    let pension_account = match calc.pension_system {
        PensionSystem::Onp => accounts::ONP,
        PensionSystem::Afp => accounts::AFP,
    };

    JournalEntryDraft::new(date, format!("Planilla {} {}", period, employee_name))
        .debit(accounts::SALARIES, calc.gross)
        .debit(accounts::SOCIAL_SECURITY, calc.essalud)
        .credit(accounts::ESSALUD, calc.essalud)
        .credit(pension_account, calc.pension)
        .credit(accounts::STAFF_RECEIVABLES, calc.other_deductions)
        .credit(accounts::SALARIES_PAYABLE, calc.net)
}

pub fn payroll_payment_entry(
    date: NaiveDate,
    employee_name: &str,
    period: &str,
    net: Money,
) -> JournalEntryDraft {
    JournalEntryDraft::new(date, format!("Pago planilla {} {}", period, employee_name))
        .debit(accounts::SALARIES_PAYABLE, net)
        .credit(accounts::BANK, net)
}

// =============================================================================
// Mayor & Trial Balance
// =============================================================================

/// A stored line joined with its entry header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedLine {
    pub entry_number: i64,
    pub entry_date: NaiveDate,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct MayorRow {
    pub entry_number: i64,
    #[ts(as = "String")]
    pub entry_date: NaiveDate,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    pub balance: Money,
}

/// The mayor of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct LedgerAccount {
    pub code: String,
    pub name: String,
    pub nature: Nature,
    pub rows: Vec<MayorRow>,
    pub total_debit: Money,
    pub total_credit: Money,
    pub balance: Money,
}

impl LedgerAccount {
    /// Builds the running balance; `lines` must be in posting order.
    pub fn build(account: &Account, lines: &[PostedLine]) -> Self {
        let mut balance = Money::zero();
        let mut total_debit = Money::zero();
        let mut total_credit = Money::zero();

        let rows = lines
            .iter()
            .map(|line| {
                total_debit += line.debit;
                total_credit += line.credit;
                balance += match account.nature {
                    Nature::Debit => line.debit - line.credit,
                    Nature::Credit => line.credit - line.debit,
                };
                MayorRow {
                    entry_number: line.entry_number,
                    entry_date: line.entry_date,
                    description: line.description.clone(),
                    debit: line.debit,
                    credit: line.credit,
                    balance,
                }
            })
            .collect();

        LedgerAccount {
            code: account.code.to_string(),
            name: account.name.to_string(),
            nature: account.nature,
            rows,
            total_debit,
            total_credit,
            balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct TrialBalanceRow {
    pub code: String,
    pub name: String,
    pub debit: Money,
    pub credit: Money,
    pub debit_balance: Money,
    pub credit_balance: Money,
}

/// Balance de comprobación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Money,
    pub total_credit: Money,
    pub is_balanced: bool,
}

impl TrialBalance {
    /// `sums` holds Σ debit and Σ credit per account code.
    pub fn build(sums: &[(String, Money, Money)]) -> Self {
        let mut rows: Vec<TrialBalanceRow> = sums
            .iter()
            .map(|(code, debit, credit)| {
                let net = *debit - *credit;
                TrialBalanceRow {
                    code: code.clone(),
                    name: find_account(code)
                        .map(|a| a.name.to_string())
                        .unwrap_or_default(),
                    debit: *debit,
                    credit: *credit,
                    debit_balance: net.non_negative(),
                    credit_balance: (-net).non_negative(),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        let total_debit: Money = rows.iter().map(|r| r.debit).sum();
        let total_credit: Money = rows.iter().map(|r| r.credit).sum();

        TrialBalance {
            is_balanced: total_debit == total_credit,
            rows,
            total_debit,
            total_credit,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn m(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_chart_lookup() {
        assert_eq!(find_account("701").unwrap().nature, Nature::Credit);
        assert_eq!(find_account("101").unwrap().name, "Caja");
        assert!(find_account("999").is_none());
    }

    #[test]
    fn test_validate_rejects_unbalanced() {
        let draft = JournalEntryDraft::new(day(), "x")
            .debit(accounts::CASH, m(100))
            .credit(accounts::SALES, m(90));
        assert!(matches!(
            draft.validate(),
            Err(CoreError::UnbalancedEntry { debit: 100, credit: 90 })
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_lines() {
        let single = JournalEntryDraft::new(day(), "x").debit(accounts::CASH, m(100));
        assert!(single.validate().is_err());

        let mut two_sided = JournalEntryDraft::new(day(), "x")
            .debit(accounts::CASH, m(100))
            .credit(accounts::SALES, m(100));
        two_sided.lines[0].credit = m(5);
        assert!(two_sided.validate().is_err());

        let unknown = JournalEntryDraft::new(day(), "x")
            .debit("999", m(100))
            .credit(accounts::SALES, m(100));
        assert!(unknown.validate().is_err());

        let negative = JournalEntryDraft {
            lines: vec![
                JournalLineDraft {
                    account_code: accounts::CASH.to_string(),
                    debit: m(-100),
                    credit: Money::zero(),
                    memo: None,
                },
                JournalLineDraft {
                    account_code: accounts::SALES.to_string(),
                    debit: Money::zero(),
                    credit: m(-100),
                    memo: None,
                },
            ],
            ..JournalEntryDraft::new(day(), "x")
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_sale_entry_and_mirror_balance() {
        let (taxable, igv) = m(7200).split_inclusive(crate::IGV_RATE);
        let posting = SalePosting {
            cash: m(2200),
            bank: m(5000),
            receivable: Money::zero(),
            taxable,
            igv,
        };
        let entry = sale_entry(day(), "B001-00000001", &posting);
        assert!(entry.validate().is_ok());
        assert_eq!(entry.lines.len(), 4);

        let void = entry.mirror(day(), "Anulación B001-00000001");
        assert!(void.validate().is_ok());
        assert_eq!(void.lines[0].credit, m(2200));
    }

    #[test]
    fn test_other_templates_balance() {
        assert!(cost_of_sale_entry(day(), "B001-1", Money::zero()).is_none());
        assert!(cost_of_sale_entry(day(), "B001-1", m(1500)).unwrap().validate().is_ok());

        let (taxable, igv) = m(11800).split_inclusive(crate::IGV_RATE);
        assert!(purchase_entry(day(), "F001-9", taxable, igv, accounts::PAYABLES)
            .validate()
            .is_ok());
        assert!(collection_entry(day(), "Cobro", PaymentMethod::Yape, m(500)).validate().is_ok());
        assert!(payable_payment_entry(day(), "Pago", PaymentMethod::Cash, m(500))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_payroll_entries_balance() {
        use crate::payroll::{compute_payslip, PayrollRules, PayslipInput};
        use crate::TaxRate;

        let calc = compute_payslip(
            &PayslipInput {
                monthly_salary: m(200_000),
                pension_system: PensionSystem::Afp,
                afp_commission: TaxRate::from_bps(155),
                has_dependents: true,
                absence_days: 1,
                bonuses: m(5_000),
                deductions: m(10_000),
            },
            &PayrollRules::default(),
        )
        .unwrap();

        let accrual = payroll_accrual_entry(day(), "Ana Quispe", "2026-10", &calc);
        assert!(accrual.validate().is_ok());
        assert!(accrual.lines.iter().any(|l| l.account_code == accounts::AFP));

        let payment = payroll_payment_entry(day(), "Ana Quispe", "2026-10", calc.net);
        assert!(payment.validate().is_ok());
    }

    #[test]
    fn test_mayor_running_balance() {
        let cash = find_account(accounts::CASH).unwrap();
        let lines = vec![
            PostedLine {
                entry_number: 1,
                entry_date: day(),
                description: "Venta".to_string(),
                debit: m(1000),
                credit: Money::zero(),
            },
            PostedLine {
                entry_number: 2,
                entry_date: day(),
                description: "Compra".to_string(),
                debit: Money::zero(),
                credit: m(300),
            },
        ];
        let mayor = LedgerAccount::build(cash, &lines);
        assert_eq!(mayor.rows[0].balance, m(1000));
        assert_eq!(mayor.rows[1].balance, m(700));
        assert_eq!(mayor.balance, m(700));

        let sales = find_account(accounts::SALES).unwrap();
        let mayor = LedgerAccount::build(sales, &lines);
        assert_eq!(mayor.balance, m(-700));
    }

    #[test]
    fn test_trial_balance() {
        let tb = TrialBalance::build(&[
            ("701".to_string(), Money::zero(), m(6102)),
            ("101".to_string(), m(7200), Money::zero()),
            ("4011".to_string(), Money::zero(), m(1098)),
        ]);
        assert!(tb.is_balanced);
        assert_eq!(tb.rows[0].code, "101");
        assert_eq!(tb.rows[0].debit_balance, m(7200));
        assert_eq!(tb.rows[2].credit_balance, m(6102));
        assert_eq!(tb.total_debit, m(7200));
    }
}
