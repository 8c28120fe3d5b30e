//! # Sale Module
//!
//! The arithmetic and document rules behind a checkout.
//!
//! ## Checkout Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LineInput[] ──► price_lines() ──► PricedLine[] + SaleTotals            │
//! │                                         │                               │
//! │  Customer + DocumentKind ──► check_document(total)                      │
//! │                                         │                               │
//! │  TenderInput[] ──► settle(total) ──► Settlement                         │
//! │                                      (applied payments, change, credit) │
//! │                                                                         │
//! │  tambo-db persists the result inside one transaction.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Prices include IGV. The taxable base and IGV of a sale are derived from
//! its final total with [`Money::split_inclusive`], which is how a boleta
//! shows them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_dni, validate_quantity, validate_ruc};
use crate::{BOLETA_IDENTIFICATION_THRESHOLD, IGV_RATE, MAX_LINES};

// =============================================================================
// Documents
// =============================================================================

/// The kind of sale document issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Consumer receipt.
    Boleta,
    /// Invoice to a RUC holder (tax credit).
    Factura,
    /// Internal ticket, not reported to SUNAT.
    NotaVenta,
}

impl DocumentKind {
    /// Series used when a branch has none configured.
    pub fn default_series(&self) -> &'static str {
        match self {
            DocumentKind::Boleta => "B001",
            DocumentKind::Factura => "F001",
            DocumentKind::NotaVenta => "NV01",
        }
    }
}

/// Formats `SERIE-NNNNNNNN`.
///
/// ```rust
/// use tambo_core::sale::format_document_number;
///
/// assert_eq!(format_document_number("B001", 42), "B001-00000042");
/// ```
pub fn format_document_number(series: &str, correlative: i64) -> String {
    format!("{}-{:08}", series, correlative)
}

/// Identity document of the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerDocType {
    None,
    Dni,
    Ruc,
}

/// The buyer printed on the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub doc_type: CustomerDocType,
    pub doc_number: Option<String>,
    pub name: Option<String>,
}

impl Customer {
    /// "Clientes varios".
    pub fn anonymous() -> Self {
        Customer {
            doc_type: CustomerDocType::None,
            doc_number: None,
            name: None,
        }
    }

    pub fn is_identified(&self) -> bool {
        self.doc_type != CustomerDocType::None
    }

    /// Checks the document number against its type.
    pub fn validate(&self) -> CoreResult<()> {
        match (self.doc_type, self.doc_number.as_deref()) {
            (CustomerDocType::None, None) => Ok(()),
            (CustomerDocType::None, Some(_)) => Err(ValidationError::invalid_format(
                "customer.doc_number",
                "given without a document type",
            )
            .into()),
            (CustomerDocType::Dni, Some(n)) => Ok(validate_dni(n)?),
            (CustomerDocType::Ruc, Some(n)) => Ok(validate_ruc(n)?),
            (_, None) => Err(ValidationError::required("customer.doc_number").into()),
        }
    }
}

/// Checks that `kind` may be issued to `customer` for `total`.
///
/// ## Rules
/// - Factura: customer must hold a RUC
/// - Boleta: from S/ 700.00 the customer must be identified
/// - Nota de venta: no restriction
pub fn check_document(kind: DocumentKind, customer: &Customer, total: Money) -> CoreResult<()> {
    customer.validate()?;

    match kind {
        DocumentKind::Factura if customer.doc_type != CustomerDocType::Ruc => Err(
            CoreError::DocumentRule("a factura requires a customer RUC".to_string()),
        ),
        DocumentKind::Boleta
            if total >= BOLETA_IDENTIFICATION_THRESHOLD && !customer.is_identified() =>
        {
            Err(CoreError::DocumentRule(format!(
                "a boleta of {} or more requires an identified customer",
                BOLETA_IDENTIFICATION_THRESHOLD
            )))
        }
        _ => Ok(()),
    }
}

/// Lifecycle of an issued sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Voided,
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaleStatus::Completed => f.write_str("completed"),
            SaleStatus::Voided => f.write_str("voided"),
        }
    }
}

// =============================================================================
// Payment Methods
// =============================================================================

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Yape,
    Plin,
    Transfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Yape,
        PaymentMethod::Plin,
        PaymentMethod::Transfer,
    ];

    #[inline]
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }

    /// Ledger account the money lands in: 101 Caja or 104 Cuentas corrientes.
    pub fn ledger_account(&self) -> &'static str {
        if self.is_cash() {
            crate::ledger::accounts::CASH
        } else {
            crate::ledger::accounts::BANK
        }
    }
}

// =============================================================================
// Lines & Totals
// =============================================================================

/// A line as requested by the caller, prices already resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    /// IGV included.
    pub unit_price: Money,
    pub quantity: i64,
    pub discount: Money,
}

/// A validated line with its total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub discount: Money,
    pub line_total: Money,
}

/// Totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    /// Σ unit price × quantity.
    pub gross: Money,
    /// Line discounts + global discount.
    pub discount: Money,
    /// Amount due.
    pub total: Money,
    /// Op. gravada (total without IGV).
    pub taxable: Money,
    pub igv: Money,
}

/// Validates lines and computes the sale totals.
///
/// ## Errors
/// - no lines, or more than [`MAX_LINES`]
/// - a quantity out of range, a negative price or discount
/// - a line discount above its line amount, or total discount above gross
pub fn price_lines(
    lines: &[LineInput],
    global_discount: Money,
) -> CoreResult<(Vec<PricedLine>, SaleTotals)> {
    if lines.is_empty() {
        return Err(ValidationError::required("items").into());
    }

    if lines.len() > MAX_LINES {
        return Err(CoreError::TooManyLines { max: MAX_LINES });
    }

    if global_discount.is_negative() {
        return Err(ValidationError::must_be_positive("discount").into());
    }

    let mut priced = Vec::with_capacity(lines.len());
    let mut gross = Money::zero();
    let mut discount = global_discount;

    for line in lines {
        validate_quantity(line.quantity)?;

        if line.unit_price.is_negative() || line.discount.is_negative() {
            return Err(ValidationError::invalid_format(
                "items",
                format!("{} has a negative price or discount", line.sku),
            )
            .into());
        }

        let amount = line.unit_price * line.quantity;
        if line.discount > amount {
            return Err(ValidationError::invalid_format(
                "items",
                format!("{} discount exceeds its amount", line.sku),
            )
            .into());
        }

        gross += amount;
        discount += line.discount;

        priced.push(PricedLine {
            product_id: line.product_id.clone(),
            sku: line.sku.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            discount: line.discount,
            line_total: amount - line.discount,
        });
    }

    if discount > gross {
        return Err(ValidationError::invalid_format("discount", "exceeds the sale amount").into());
    }

    let total = gross - discount;
    let (taxable, igv) = total.split_inclusive(IGV_RATE);

    Ok((
        priced,
        SaleTotals {
            gross,
            discount,
            total,
            taxable,
            igv,
        },
    ))
}

// =============================================================================
// Tendering
// =============================================================================

/// A payment offered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenderInput {
    pub method: PaymentMethod,
    /// For cash, what the customer hands over; otherwise the amount charged.
    pub amount_cents: i64,
    pub reference: Option<String>,
}

/// A payment as it applies to the sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPayment {
    pub method: PaymentMethod,
    pub amount: Money,
    pub tendered: Option<Money>,
    pub reference: Option<String>,
}

/// How a sale total was covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub payments: Vec<AppliedPayment>,
    /// Σ applied payments.
    pub paid: Money,
    /// Cash returned to the customer.
    pub change: Money,
    /// Uncovered remainder, becomes a receivable.
    pub credit: Money,
}

impl Settlement {
    /// Applied amount per method (cash net of change).
    pub fn amount_for(&self, method: PaymentMethod) -> Money {
        self.payments
            .iter()
            .filter(|p| p.method == method)
            .map(|p| p.amount)
            .sum()
    }
}

/// Applies tenders to a total.
///
/// ## Rules
/// ```text
/// 1. Non-cash tenders are charged exactly; together they may not exceed
///    the total (a card cannot give change).
/// 2. Cash covers what remains; any excess is change.
/// 3. Whatever is still uncovered is credit, allowed only when the caller
///    permits it and the customer is identified.
/// ```
pub fn settle(
    total: Money,
    tenders: &[TenderInput],
    allow_credit: bool,
    customer: &Customer,
) -> CoreResult<Settlement> {
    let mut payments = Vec::new();
    let mut non_cash = Money::zero();
    let mut cash_tendered = Money::zero();

    for tender in tenders {
        let amount = Money::from_cents(tender.amount_cents);
        if !amount.is_positive() {
            return Err(CoreError::InvalidPayment {
                reason: "payment amounts must be positive".to_string(),
            });
        }

        if tender.method.is_cash() {
            cash_tendered += amount;
        } else {
            non_cash += amount;
            payments.push(AppliedPayment {
                method: tender.method,
                amount,
                tendered: None,
                reference: tender.reference.clone(),
            });
        }
    }

    if non_cash > total {
        return Err(CoreError::InvalidPayment {
            reason: format!("non-cash payments {} exceed the total {}", non_cash, total),
        });
    }

    let remaining = total - non_cash;
    let cash_applied = cash_tendered.min(remaining);
    let change = cash_tendered - cash_applied;

    if cash_tendered.is_positive() && cash_applied.is_zero() {
        return Err(CoreError::InvalidPayment {
            reason: "cash tendered but nothing is due".to_string(),
        });
    }

    if cash_applied.is_positive() {
        payments.push(AppliedPayment {
            method: PaymentMethod::Cash,
            amount: cash_applied,
            tendered: Some(cash_tendered),
            reference: None,
        });
    }

    let credit = remaining - cash_applied;
    if credit.is_positive() {
        if !allow_credit {
            return Err(CoreError::InvalidPayment {
                reason: format!("payments cover {} of {}", total - credit, total),
            });
        }
        if !customer.is_identified() {
            return Err(CoreError::InvalidPayment {
                reason: "credit sales require an identified customer".to_string(),
            });
        }
    }

    Ok(Settlement {
        payments,
        paid: non_cash + cash_applied,
        change,
        credit,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: &str, price: i64, qty: i64) -> LineInput {
        LineInput {
            product_id: format!("p-{}", sku),
            sku: sku.to_string(),
            name: sku.to_string(),
            unit_price: Money::from_cents(price),
            quantity: qty,
            discount: Money::zero(),
        }
    }

    fn dni_customer() -> Customer {
        Customer {
            doc_type: CustomerDocType::Dni,
            doc_number: Some("45678901".to_string()),
            name: Some("Rosa Huamán".to_string()),
        }
    }

    fn cash(cents: i64) -> TenderInput {
        TenderInput {
            method: PaymentMethod::Cash,
            amount_cents: cents,
            reference: None,
        }
    }

    #[test]
    fn test_price_lines_totals() {
        // Lomo saltado 32.00 ×2, Chicha 8.00 ×1 → 72.00
        let lines = vec![line("LOMO", 3200, 2), line("CHICHA", 800, 1)];
        let (priced, totals) = price_lines(&lines, Money::zero()).unwrap();

        assert_eq!(priced.len(), 2);
        assert_eq!(priced[0].line_total.cents(), 6400);
        assert_eq!(totals.gross.cents(), 7200);
        assert_eq!(totals.total.cents(), 7200);
        assert_eq!(totals.taxable.cents(), 6102);
        assert_eq!(totals.igv.cents(), 1098);
        assert_eq!(totals.taxable + totals.igv, totals.total);
    }

    #[test]
    fn test_price_lines_discounts() {
        let mut l = line("LOMO", 3200, 2);
        l.discount = Money::from_cents(400);
        let (priced, totals) = price_lines(&[l], Money::from_cents(1000)).unwrap();

        assert_eq!(priced[0].line_total.cents(), 6000);
        assert_eq!(totals.discount.cents(), 1400);
        assert_eq!(totals.total.cents(), 5000);
    }

    #[test]
    fn test_price_lines_rejects_bad_input() {
        assert!(price_lines(&[], Money::zero()).is_err());
        assert!(price_lines(&[line("A", 100, 0)], Money::zero()).is_err());
        assert!(price_lines(&[line("A", -100, 1)], Money::zero()).is_err());
        assert!(price_lines(&[line("A", 100, 1)], Money::from_cents(101)).is_err());

        let mut l = line("A", 100, 1);
        l.discount = Money::from_cents(150);
        assert!(price_lines(&[l], Money::zero()).is_err());

        let many: Vec<_> = (0..=MAX_LINES).map(|i| line(&format!("S{}", i), 100, 1)).collect();
        assert!(matches!(
            price_lines(&many, Money::zero()),
            Err(CoreError::TooManyLines { .. })
        ));
    }

    #[test]
    fn test_document_rules() {
        let small = Money::from_cents(5000);
        let big = Money::from_cents(70_000);
        let anon = Customer::anonymous();

        assert!(check_document(DocumentKind::Boleta, &anon, small).is_ok());
        assert!(matches!(
            check_document(DocumentKind::Boleta, &anon, big),
            Err(CoreError::DocumentRule(_))
        ));
        assert!(check_document(DocumentKind::Boleta, &dni_customer(), big).is_ok());
        assert!(check_document(DocumentKind::NotaVenta, &anon, big).is_ok());

        assert!(check_document(DocumentKind::Factura, &dni_customer(), small).is_err());
        let company = Customer {
            doc_type: CustomerDocType::Ruc,
            doc_number: Some("20131312955".to_string()),
            name: Some("SUNAT".to_string()),
        };
        assert!(check_document(DocumentKind::Factura, &company, small).is_ok());

        let bad_ruc = Customer {
            doc_number: Some("20131312956".to_string()),
            ..company
        };
        assert!(matches!(
            check_document(DocumentKind::Factura, &bad_ruc, small),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_settle_cash_with_change() {
        let s = settle(Money::from_cents(7200), &[cash(10_000)], false, &Customer::anonymous())
            .unwrap();
        assert_eq!(s.paid.cents(), 7200);
        assert_eq!(s.change.cents(), 2800);
        assert!(s.credit.is_zero());
        assert_eq!(s.payments.len(), 1);
        assert_eq!(s.payments[0].tendered, Some(Money::from_cents(10_000)));
    }

    #[test]
    fn test_settle_split_payment() {
        let tenders = vec![
            TenderInput {
                method: PaymentMethod::Yape,
                amount_cents: 5000,
                reference: Some("OP-991".to_string()),
            },
            cash(3000),
        ];
        let s = settle(Money::from_cents(7200), &tenders, false, &Customer::anonymous()).unwrap();
        assert_eq!(s.amount_for(PaymentMethod::Yape).cents(), 5000);
        assert_eq!(s.amount_for(PaymentMethod::Cash).cents(), 2200);
        assert_eq!(s.change.cents(), 800);
    }

    #[test]
    fn test_settle_card_cannot_exceed_total() {
        let tenders = vec![TenderInput {
            method: PaymentMethod::Card,
            amount_cents: 8000,
            reference: None,
        }];
        assert!(matches!(
            settle(Money::from_cents(7200), &tenders, false, &Customer::anonymous()),
            Err(CoreError::InvalidPayment { .. })
        ));
    }

    #[test]
    fn test_settle_short_payment() {
        let total = Money::from_cents(7200);
        assert!(settle(total, &[cash(5000)], false, &dni_customer()).is_err());
        assert!(settle(total, &[cash(5000)], true, &Customer::anonymous()).is_err());

        let s = settle(total, &[cash(5000)], true, &dni_customer()).unwrap();
        assert_eq!(s.credit.cents(), 2200);
        assert_eq!(s.paid.cents(), 5000);
    }

    #[test]
    fn test_settle_rejects_cash_when_nothing_due() {
        let tenders = vec![
            TenderInput {
                method: PaymentMethod::Card,
                amount_cents: 7200,
                reference: None,
            },
            cash(100),
        ];
        assert!(settle(Money::from_cents(7200), &tenders, false, &Customer::anonymous()).is_err());
    }

    #[test]
    fn test_document_number() {
        assert_eq!(format_document_number("F001", 1), "F001-00000001");
        assert_eq!(DocumentKind::NotaVenta.default_series(), "NV01");
    }
}
