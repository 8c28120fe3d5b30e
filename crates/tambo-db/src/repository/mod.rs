//! # Repository Module
//!
//! Tenant-scoped repository implementations for Tambo ERP.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler                                                           │
//! │       │                                                                 │
//! │       │  db.scoped(&scope).sales().checkout(req)                        │
//! │       ▼                                                                 │
//! │  SaleRepository { pool, scope }                                         │
//! │  ├── loads rows        (WHERE company_id = scope.company_id)            │
//! │  ├── tambo-core rules  (price_lines, settle, StockLevel::issue, ...)    │
//! │  └── writes rows       (one transaction per workflow)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CompanyRepository`] - Companies, branches, users (unscoped)
//! - [`ProductRepository`] - Catalog
//! - [`InventoryRepository`] - Warehouses, stock and kardex
//! - [`TableRepository`] - Dining tables and their preventa
//! - [`CashRepository`] - Registers and cash sessions
//! - [`SaleRepository`] - Checkout and voids
//! - [`PurchaseRepository`] - Supplier invoices
//! - [`AccountsRepository`] - Receivables and payables
//! - [`LedgerRepository`] - Journal, mayor, trial balance
//! - [`PayrollRepository`] - Staff and payroll periods
//! - [`OrderRepository`] - Online orders
//! - [`WhatsAppRepository`] - Channels and conversations

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

pub mod accounts;
pub mod cash;
pub mod company;
pub mod inventory;
pub mod ledger;
pub mod order;
pub mod payroll;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod table;
pub mod whatsapp;

pub use accounts::{AccountsRepository, CreditAccountView};
pub use cash::{CashRepository, SessionView};
pub use company::{CompanyRepository, NewBranch, NewCompany, NewUser};
pub use inventory::{AdjustRequest, InventoryRepository, NewProduct, TransferRequest};
pub use ledger::{JournalEntryView, LedgerRepository};
pub use order::{OrderDetail, OrderRepository};
pub use payroll::{EmployeeInput, PayrollRepository, PeriodDetail};
pub use product::{ProductRepository, ProductUpdate};
pub use purchase::{PurchaseDetail, PurchaseItemInput, PurchaseRepository, PurchaseRequest};
pub use sale::{CheckoutRequest, ItemRequest, SaleDetail, SaleRepository, SaleSource};
pub use table::{TableOrderView, TableRepository};
pub use whatsapp::WhatsAppRepository;

/// Generates a new row id (UUID v4).
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Accounting date of "now" (UTC).
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
