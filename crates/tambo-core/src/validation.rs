//! # Validation Module
//!
//! Input validation rules applied before any business logic runs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API request (serde)                                          │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── RUC checksum, DNI, phone, quantities, periods                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL, UNIQUE, foreign keys, partial unique indexes            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tambo_core::validation::{validate_ruc, validate_dni};
//!
//! assert!(validate_ruc("20131312955").is_ok());
//! assert!(validate_dni("4567890").is_err());
//! ```

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identity Documents
// =============================================================================

/// RUC type prefixes accepted by SUNAT (persons, non-domiciled, companies).
const RUC_PREFIXES: &[&str] = &["10", "15", "16", "17", "20"];

/// Modulo-11 weights applied to the first ten RUC digits.
const RUC_WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

/// Validates a RUC (Registro Único de Contribuyentes).
///
/// ## Rules
/// - Exactly 11 digits
/// - Starts with 10, 15, 16, 17 or 20
/// - Last digit is the modulo-11 check digit of the first ten
///
/// ## Check Digit
/// ```text
/// 2 0 1 3 1 3 1 2 9 5 │ 5
/// × 5 4 3 2 7 6 5 4 3 2
/// ─────────────────────
/// Σ = 94   94 mod 11 = 6   11 − 6 = 5 ✓
/// (10 → 0, 11 → 1)
/// ```
pub fn validate_ruc(ruc: &str) -> ValidationResult<()> {
    let ruc = ruc.trim();

    if ruc.is_empty() {
        return Err(ValidationError::required("ruc"));
    }

    if ruc.len() != 11 || !ruc.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format("ruc", "must be 11 digits"));
    }

    if !RUC_PREFIXES.iter().any(|p| ruc.starts_with(p)) {
        return Err(ValidationError::invalid_format(
            "ruc",
            "must start with 10, 15, 16, 17 or 20",
        ));
    }

    let digits: Vec<u32> = ruc.chars().filter_map(|c| c.to_digit(10)).collect();
    let sum: u32 = digits
        .iter()
        .zip(RUC_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();

    let expected = match 11 - (sum % 11) {
        10 => 0,
        11 => 1,
        r => r,
    };

    if digits[10] != expected {
        return Err(ValidationError::invalid_format("ruc", "check digit mismatch"));
    }

    Ok(())
}

/// Validates a DNI (national identity document): exactly 8 digits.
pub fn validate_dni(dni: &str) -> ValidationResult<()> {
    let dni = dni.trim();

    if dni.is_empty() {
        return Err(ValidationError::required("dni"));
    }

    if dni.len() != 8 || !dni.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format("dni", "must be 8 digits"));
    }

    Ok(())
}

// =============================================================================
// Contact
// =============================================================================

/// Validates and normalizes a phone number.
///
/// Accepts the `whatsapp:+51987654321` form Twilio posts, bare
/// `+51987654321` or `51987654321`, and a local mobile `987654321`
/// (country code 51 assumed). Spaces and dashes are ignored.
///
/// ## Returns
/// The E.164 form: `+` followed by 8-15 digits. The same number always
/// normalizes to the same string, with or without the `+`.
pub fn normalize_phone(phone: &str) -> ValidationResult<String> {
    let phone = phone.trim();
    let phone = phone.strip_prefix("whatsapp:").unwrap_or(phone).trim();

    if phone.is_empty() {
        return Err(ValidationError::required("phone"));
    }

    let (international, rest) = match phone.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, phone),
    };

    let digits: String = rest.chars().filter(|c| !matches!(c, ' ' | '-')).collect();

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format("phone", "must contain only digits"));
    }

    if digits.len() < 8 || digits.len() > 15 {
        return Err(ValidationError::invalid_format("phone", "must have 8 to 15 digits"));
    }

    if !international && digits.len() == PE_MOBILE_LEN && digits.starts_with('9') {
        return Ok(format!("+{}{}", PE_COUNTRY_CODE, digits));
    }

    Ok(format!("+{}", digits))
}

const PE_COUNTRY_CODE: &str = "51";
const PE_MOBILE_LEN: usize = 9;

// =============================================================================
// Strings
// =============================================================================

/// Validates a display name (person, product, table, branch).
///
/// ## Rules
/// - Not empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a SKU: 1-50 letters, digits, hyphens or underscores.
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::invalid_format(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a password at account creation: at least 8 characters.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < 8 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 8,
        });
    }
    Ok(())
}

// =============================================================================
// Numbers
// =============================================================================

/// Validates a line quantity (1 to [`MAX_LINE_QUANTITY`]).
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates that an amount in céntimos is strictly positive.
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

/// Validates that an amount in céntimos is zero or more.
pub fn validate_non_negative_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a payroll period (year 2000-2100, month 1-12).
pub fn validate_period(year: i64, month: i64) -> ValidationResult<()> {
    if !(2000..=2100).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: "year".to_string(),
            min: 2000,
            max: 2100,
        });
    }

    if !(1..=12).contains(&month) {
        return Err(ValidationError::OutOfRange {
            field: "month".to_string(),
            min: 1,
            max: 12,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_rucs() {
        assert!(validate_ruc("20131312955").is_ok());
        assert!(validate_ruc("20100070970").is_ok());
        assert!(validate_ruc(" 20131312955 ").is_ok());
    }

    #[test]
    fn test_invalid_rucs() {
        assert!(matches!(validate_ruc(""), Err(ValidationError::Required { .. })));
        // wrong check digit
        assert!(validate_ruc("20131312956").is_err());
        // wrong prefix
        assert!(validate_ruc("30131312955").is_err());
        // length
        assert!(validate_ruc("2013131295").is_err());
        assert!(validate_ruc("2013131295A").is_err());
    }

    #[test]
    fn test_dni() {
        assert!(validate_dni("45678901").is_ok());
        assert!(validate_dni("4567890").is_err());
        assert!(validate_dni("4567890X").is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("whatsapp:+51987654321").unwrap(), "+51987654321");
        assert_eq!(normalize_phone("+51 987 654 321").unwrap(), "+51987654321");
        assert_eq!(normalize_phone("987-654-321").unwrap(), "+51987654321");
        assert_eq!(normalize_phone("51987654321").unwrap(), "+51987654321");
        assert_eq!(normalize_phone("whatsapp:51987654321").unwrap(), "+51987654321");
        assert_eq!(normalize_phone("+1 415 555 0100").unwrap(), "+14155550100");
        assert!(normalize_phone("whatsapp:").is_err());
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("+51abc").is_err());
    }

    #[test]
    fn test_sku_and_name() {
        assert!(validate_sku("INCA-KOLA_500").is_ok());
        assert!(validate_sku("bad sku").is_err());
        assert!(validate_name("name", "Lomo saltado").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"a".repeat(201)).is_err());
    }

    #[test]
    fn test_quantity_and_amounts() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
        assert!(validate_positive_amount("amount", 1).is_ok());
        assert!(validate_positive_amount("amount", 0).is_err());
        assert!(validate_non_negative_amount("opening", 0).is_ok());
        assert!(validate_non_negative_amount("opening", -1).is_err());
    }

    #[test]
    fn test_period() {
        assert!(validate_period(2026, 10).is_ok());
        assert!(validate_period(2026, 13).is_err());
        assert!(validate_period(1999, 1).is_err());
    }

    #[test]
    fn test_password() {
        assert!(validate_password("secreto123").is_ok());
        assert!(validate_password("corto").is_err());
    }
}
