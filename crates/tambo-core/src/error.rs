//! # Error Types
//!
//! Domain-specific error types for tambo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tambo-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tambo-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  API errors (apps/api)                                                 │
//! │  └── ApiError         - What the frontend sees (code + message)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Frontend     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Insufficient stock to complete a sale, transfer or adjustment.
    ///
    /// ## When This Occurs
    /// - Selling more than the warehouse holds
    /// - Product has `allow_negative_stock = false`
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// A state machine was asked for a transition it does not allow.
    ///
    /// ## When This Occurs
    /// - Starting validation of a payroll period that is already paid
    /// - Adding items to a table order that is waiting for the bill
    /// - Closing a cash session twice
    #[error("{entity} cannot go from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// The operation needs the entity in a different state.
    #[error("{entity} is {status}: {reason}")]
    InvalidState {
        entity: &'static str,
        status: String,
        reason: String,
    },

    /// Payments do not satisfy the sale total.
    #[error("Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    /// Journal entry debits and credits differ.
    #[error("Unbalanced journal entry: debit {debit}, credit {credit}")]
    UnbalancedEntry { debit: i64, credit: i64 },

    /// The sale document cannot be issued to this customer.
    ///
    /// ## When This Occurs
    /// - Factura without a RUC
    /// - Boleta of S/ 700.00 or more to an anonymous customer
    #[error("Document rule violated: {0}")]
    DocumentRule(String),

    /// Payroll cannot be validated; each entry names an employee and the reason.
    #[error("Payroll validation failed for {} employee(s): {}", .0.len(), .0.join("; "))]
    PayrollIncomplete(Vec<String>),

    /// Payment exceeds the outstanding balance of a receivable/payable.
    #[error("Payment {amount} exceeds outstanding balance {balance}")]
    Overpayment { amount: i64, balance: i64 },

    /// Cart or order has too many lines.
    #[error("Cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidTransition`].
    pub fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        CoreError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Shorthand for [`CoreError::InvalidState`].
    pub fn state(entity: &'static str, status: impl ToString, reason: impl Into<String>) -> Self {
        CoreError::InvalidState {
            entity,
            status: status.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (RUC checksum, DNI length, phone digits...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub fn invalid_format(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn must_be_positive(field: &str) -> Self {
        ValidationError::MustBePositive {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "LOMO-01".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for LOMO-01: available 3, requested 5"
        );

        let err = CoreError::transition("Payroll period", "paid", "validating");
        assert_eq!(err.to_string(), "Payroll period cannot go from paid to validating");
    }

    #[test]
    fn test_payroll_incomplete_lists_employees() {
        let err = CoreError::PayrollIncomplete(vec![
            "Ana Quispe: no payslip".to_string(),
            "Luis Rojas: negative net pay".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Payroll validation failed for 2 employee(s): Ana Quispe: no payslip; Luis Rojas: negative net pay"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("ruc").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: ruc is required");
    }
}
