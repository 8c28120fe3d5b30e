//! # Domain Records
//!
//! Persisted records shared by the database layer and the API.
//!
//! ## Record Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Company ──┬── Branch ──┬── Warehouse ── StockRow / KardexEntry         │
//! │            │            ├── DiningTable ── TableOrder ── TableOrderItem │
//! │            │            ├── CashRegister ── CashSession ── CashMovement │
//! │            │            ├── Sale ── SaleItem / SalePayment              │
//! │            │            ├── Purchase ── PurchaseItem                    │
//! │            │            ├── CreditAccount ── CreditPayment              │
//! │            │            ├── Employee ── Payslip / PayrollPayment        │
//! │            │            ├── PayrollPeriod                               │
//! │            │            └── Order ── OrderItem (WhatsApp)               │
//! │            ├── User, Area, Position, Product                            │
//! │            └── JournalEntry ── JournalLine                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ids are UUID v4 strings. Amounts are `*_cents` columns (céntimos); wrap
//! them in [`Money`] for arithmetic.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::accounts::{AccountStatus, CreditKind};
use crate::cash::{CashMovementKind, CashSessionStatus};
use crate::inventory::MovementKind;
use crate::money::Money;
use crate::payroll::{AdjustmentKind, AttendanceStatus, PensionSystem, PeriodStatus};
use crate::sale::{CustomerDocType, DocumentKind, PaymentMethod, SaleStatus};
use crate::table::{TableOrderStatus, TableStatus};

// =============================================================================
// Company, Branch, Users
// =============================================================================

/// A tenant (empresa).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Company {
    pub id: String,
    pub ruc: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A branch (sede) of a company.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// What a user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Cashier,
    Waiter,
    Accountant,
}

impl Role {
    /// Payroll and manual journal entries.
    pub fn can_manage_books(&self) -> bool {
        matches!(self, Role::Admin | Role::Accountant)
    }
}

/// A login account (usuario).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub company_id: String,
    /// Branch the user works at by default.
    pub branch_id: String,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Catalog & Inventory
// =============================================================================

/// A product or menu item, shared by all branches of a company.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub company_id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    /// Shelf price in céntimos, IGV included.
    pub price_cents: i64,
    /// Kardex is kept only for tracked products (not for prepared dishes).
    pub track_inventory: bool,
    pub allow_negative_stock: bool,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// A warehouse (almacén) of a branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Warehouse {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub name: String,
    /// Sales and purchases move stock of the branch's default warehouse.
    pub is_default: bool,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Current stock of a product in a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockRow {
    pub warehouse_id: String,
    pub product_id: String,
    pub sku: String,
    pub product_name: String,
    pub quantity: i64,
    pub average_cost_cents: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One line of the kardex (inventory movement ledger).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct KardexEntry {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub warehouse_id: String,
    pub product_id: String,
    pub movement: MovementKind,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub total_cost_cents: i64,
    pub balance_quantity: i64,
    pub balance_average_cost_cents: i64,
    pub balance_value_cents: i64,
    /// Source document, e.g. `sale:<id>`, `purchase:<id>`.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Tables (mesas)
// =============================================================================

/// A dining table.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DiningTable {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    /// Label shown to waiters ("M-04", "Terraza 2").
    pub label: String,
    pub capacity: i64,
    pub status: TableStatus,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A table's pending order (preventa).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TableOrder {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub table_id: String,
    pub waiter_id: String,
    pub status: TableOrderStatus,
    pub guests: i64,
    pub sale_id: Option<String>,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// A line of a table order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TableOrderItem {
    pub id: String,
    pub table_order_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Kitchen note ("sin cebolla").
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash (caja)
// =============================================================================

/// A physical cash register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An opening-to-closing session of a register.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub register_id: String,
    pub user_id: String,
    pub status: CashSessionStatus,
    pub opening_cents: i64,
    pub expected_cents: Option<i64>,
    pub counted_cents: Option<i64>,
    pub variance_cents: Option<i64>,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// A manual income or expense recorded during a session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub kind: CashMovementKind,
    pub amount_cents: i64,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales (ventas)
// =============================================================================

/// An issued sale document.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub session_id: String,
    pub user_id: String,
    pub document_kind: DocumentKind,
    pub series: String,
    pub correlative: i64,
    /// `B001-00000042`
    pub document_number: String,
    pub customer_doc_type: CustomerDocType,
    pub customer_doc_number: Option<String>,
    pub customer_name: Option<String>,
    pub status: SaleStatus,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub taxable_cents: i64,
    pub igv_cents: i64,
    pub paid_cents: i64,
    pub change_cents: i64,
    pub credit_cents: i64,
    pub cost_cents: i64,
    pub table_order_id: Option<String>,
    pub order_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
}

/// A line item in a sale, with product data frozen at sale time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
    /// Average cost at the moment the stock left (0 for untracked items).
    pub unit_cost_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A payment towards a sale; a sale can be split across methods.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalePayment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    /// Amount applied to the sale.
    pub amount_cents: i64,
    /// For cash: what the customer handed over.
    pub tendered_cents: Option<i64>,
    /// Operation number for Yape/Plin/card/transfer.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Purchases (compras)
// =============================================================================

/// A supplier invoice registered into a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub warehouse_id: String,
    pub user_id: String,
    pub supplier_ruc: String,
    pub supplier_name: String,
    pub document_number: String,
    pub total_cents: i64,
    pub taxable_cents: i64,
    pub igv_cents: i64,
    pub on_credit: bool,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A line of a purchase; `unit_cost_cents` includes IGV.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Receivables / Payables (cuentas por cobrar / pagar)
// =============================================================================

/// An outstanding balance owed to (receivable) or by (payable) the company.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditAccount {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub kind: CreditKind,
    pub counterparty_doc: String,
    pub counterparty_name: Option<String>,
    /// `sale:<id>` or `purchase:<id>`.
    pub source: String,
    pub total_cents: i64,
    pub balance_cents: i64,
    pub status: AccountStatus,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A collection or payment applied to a [`CreditAccount`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditPayment {
    pub id: String,
    pub account_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub journal_entry_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ledger (libro diario)
// =============================================================================

/// A posted journal entry (asiento).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct JournalEntry {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    /// Sequential per company.
    pub number: i64,
    #[ts(as = "String")]
    pub entry_date: NaiveDate,
    pub description: String,
    pub source: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A debit or credit line of a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct JournalLine {
    pub id: String,
    pub entry_id: String,
    pub account_code: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub memo: Option<String>,
}

// =============================================================================
// People & Payroll
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Area {
    pub id: String,
    pub company_id: String,
    pub name: String,
}

/// A job position (cargo).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Position {
    pub id: String,
    pub company_id: String,
    pub area_id: Option<String>,
    pub name: String,
}

/// An employee with the personal data payroll needs.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Employee {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub dni: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub area_id: Option<String>,
    pub position_id: Option<String>,
    pub monthly_salary_cents: i64,
    pub pension_system: PensionSystem,
    /// AFP commission on flow, basis points (ignored for ONP).
    pub afp_commission_bps: u32,
    pub has_dependents: bool,
    #[ts(as = "String")]
    pub hired_on: NaiveDate,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A monthly payroll period (periodo de nómina) of a branch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PayrollPeriod {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub year: i64,
    pub month: i64,
    pub status: PeriodStatus,
    #[ts(as = "Option<String>")]
    pub validation_started_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub validated_at: Option<DateTime<Utc>>,
    pub validated_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One day of attendance of an employee in a period.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AttendanceRecord {
    pub id: String,
    pub period_id: String,
    pub employee_id: String,
    #[ts(as = "String")]
    pub work_date: NaiveDate,
    pub status: AttendanceStatus,
}

/// A bonus or deduction of an employee in a period.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PayrollAdjustment {
    pub id: String,
    pub period_id: String,
    pub employee_id: String,
    pub kind: AdjustmentKind,
    pub amount_cents: i64,
    pub description: String,
}

/// A computed payslip (boleta de pago).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payslip {
    pub id: String,
    pub period_id: String,
    pub employee_id: String,
    pub employee_name: String,
    pub base_salary_cents: i64,
    pub absence_days: i64,
    pub absence_deduction_cents: i64,
    pub family_allowance_cents: i64,
    pub bonuses_cents: i64,
    pub gross_cents: i64,
    pub pension_system: PensionSystem,
    pub pension_cents: i64,
    pub other_deductions_cents: i64,
    pub net_cents: i64,
    pub essalud_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// The payment of a payslip and its two journal entries.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PayrollPayment {
    pub id: String,
    pub period_id: String,
    pub employee_id: String,
    pub payslip_id: String,
    pub amount_cents: i64,
    pub accrual_entry_id: String,
    /// `None` when the net pay is zero.
    pub payment_entry_id: Option<String>,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

// =============================================================================
// Online orders (pedidos)
// =============================================================================

/// Where an online order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderChannel {
    #[serde(rename = "whatsapp")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "whatsapp"))]
    WhatsApp,
}

/// How the customer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    Delivery,
    Pickup,
}

/// Kitchen/dispatch status of an online order.
///
/// ```text
/// Received ──► Preparing ──► Dispatched ──► Delivered
///     │            │             │
///     └────────────┴─────────────┴──► Cancelled
/// ```
/// `Dispatched` is skipped for pickup orders (`Preparing → Delivered`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Preparing,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Spanish label used in WhatsApp replies.
    pub fn label_es(&self) -> &'static str {
        match self {
            OrderStatus::Received => "recibido",
            OrderStatus::Preparing => "en preparación",
            OrderStatus::Dispatched => "en camino",
            OrderStatus::Delivered => "entregado",
            OrderStatus::Cancelled => "cancelado",
        }
    }

    /// Whether staff may move an order from `self` to `next`.
    pub fn can_advance_to(&self, next: OrderStatus, fulfillment: Fulfillment) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Received, Preparing) => true,
            (Preparing, Dispatched) => fulfillment == Fulfillment::Delivery,
            (Preparing, Delivered) => fulfillment == Fulfillment::Pickup,
            (Dispatched, Delivered) => true,
            (Received | Preparing | Dispatched, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order placed outside the dining room (WhatsApp).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub channel: OrderChannel,
    pub customer_phone: String,
    pub fulfillment: Fulfillment,
    pub address: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub sale_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

/// Maps a business WhatsApp number to the branch that answers it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WhatsAppChannel {
    pub id: String,
    pub company_id: String,
    pub branch_id: String,
    pub phone_number: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.can_manage_books());
        assert!(Role::Accountant.can_manage_books());
        assert!(!Role::Cashier.can_manage_books());
        assert!(!Role::Waiter.can_manage_books());
    }

    #[test]
    fn test_order_status_flow() {
        use OrderStatus::*;
        assert!(Received.can_advance_to(Preparing, Fulfillment::Delivery));
        assert!(Preparing.can_advance_to(Dispatched, Fulfillment::Delivery));
        assert!(!Preparing.can_advance_to(Dispatched, Fulfillment::Pickup));
        assert!(Preparing.can_advance_to(Delivered, Fulfillment::Pickup));
        assert!(!Delivered.can_advance_to(Cancelled, Fulfillment::Pickup));
        assert!(!Received.can_advance_to(Delivered, Fulfillment::Delivery));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Role::Accountant).unwrap(), "\"accountant\"");
        assert_eq!(serde_json::to_string(&OrderChannel::WhatsApp).unwrap(), "\"whatsapp\"");
    }
}
