//! # tambo-core: Pure Business Logic for Tambo ERP
//!
//! This crate holds every business rule of the ERP as pure functions with
//! zero I/O dependencies. The database layer (`tambo-db`) loads rows, hands
//! them to the functions here, and persists whatever they return.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tambo ERP Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Web frontend / Twilio webhook                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP JSON (/api/*)                     │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum handlers)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tambo-db (repositories)                      │   │
//! │  │         tenant-scoped SQL, transactions, kardex rows            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tambo-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  money  sale  inventory  cash  table  payroll  ledger          │   │
//! │  │  accounts  whatsapp  validation  tenant                        │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` in céntimos and IGV arithmetic
//! - [`tenant`] - `TenantScope`, the company/branch every query is bound to
//! - [`types`] - Persisted records (products, sales, employees, ...)
//! - [`sale`] - Checkout math: lines, discounts, tendering, document rules
//! - [`inventory`] - Kardex movements with weighted average cost
//! - [`cash`] - Cash register session summaries
//! - [`table`] - Table states and the preventa (pending table order)
//! - [`payroll`] - Payroll period state machine and payslip math
//! - [`ledger`] - Double-entry journal drafts, chart of accounts, mayor
//! - [`accounts`] - Receivable / payable balances
//! - [`whatsapp`] - Conversational ordering state machine
//! - [`validation`] - Input rules (RUC, DNI, phone, ...)
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tambo_core::money::Money;
//! use tambo_core::IGV_RATE;
//!
//! // Peruvian shelf prices include IGV
//! let price = Money::from_cents(11800); // S/ 118.00
//! let (base, igv) = price.split_inclusive(IGV_RATE);
//!
//! assert_eq!(base.cents(), 10000);
//! assert_eq!(igv.cents(), 1800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod accounts;
pub mod cash;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod money;
pub mod payroll;
pub mod sale;
pub mod table;
pub mod tenant;
pub mod types;
pub mod validation;
pub mod whatsapp;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use tenant::TenantScope;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// IGV (Impuesto General a las Ventas), 18%.
pub const IGV_RATE: TaxRate = TaxRate::from_bps(1800);

/// Boleta total from which SUNAT requires the customer to be identified.
pub const BOLETA_IDENTIFICATION_THRESHOLD: Money = Money::from_cents(70_000);

/// Default RMV (minimum monthly wage), S/ 1,130.00.
///
/// Overridable per deployment through the API configuration.
pub const DEFAULT_MINIMUM_WAGE: Money = Money::from_cents(113_000);

/// Maximum lines in a single sale or table order.
pub const MAX_LINES: usize = 200;

/// Maximum quantity of a single line.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 9_999;
