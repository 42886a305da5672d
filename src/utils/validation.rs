// Validation utilities for request fields

use bigdecimal::{BigDecimal, RoundingMode};

/// Trim and validate string fields
///
/// # Arguments
/// * `field` - The string field to validate
/// * `required` - Whether the field is required (cannot be empty)
///
/// # Returns
/// * `Ok(String)` - The trimmed string if valid
/// * `Err(String)` - Error message if validation fails
pub fn trim_and_validate_field(field: &str, required: bool) -> Result<String, String> {
    let trimmed = field.trim().to_string();
    if trimmed.is_empty() {
        if required {
            Err("Field cannot be empty".to_string())
        } else {
            Ok(trimmed) // For optional fields, empty is valid
        }
    } else {
        Ok(trimmed)
    }
}

/// Trim and optionally validate a string field
///
/// # Arguments
/// * `field` - Optional string field to validate
///
/// # Returns
/// * `None` - If the field is None or empty after trimming
/// * `Some(String)` - The trimmed string if not empty
pub fn trim_optional_field(field: Option<&String>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Parse a `YYYY-MM-DD` date field
pub fn parse_iso_date(field: &str, value: &str) -> Result<chrono::NaiveDate, String> {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{} must be a date in YYYY-MM-DD format", field))
}

/// Largest amount a NUMERIC(12,2) column holds
const MAX_MONEY_EXCLUSIVE: i64 = 10_000_000_000;

/// Positive money amount rounded half-up to kopecks
pub fn validate_money(field: &str, amount: &BigDecimal) -> Result<BigDecimal, String> {
    let rounded = amount.with_scale_round(2, RoundingMode::HalfUp);
    if rounded <= BigDecimal::from(0) {
        return Err(format!("{} must be greater than zero", field));
    }
    if rounded >= BigDecimal::from(MAX_MONEY_EXCLUSIVE) {
        return Err(format!("{} is too large", field));
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_validate_field() {
        assert_eq!(trim_and_validate_field("  Lobby ", true).unwrap(), "Lobby");
        assert!(trim_and_validate_field("   ", true).is_err());
        assert_eq!(trim_and_validate_field("   ", false).unwrap(), "");
    }

    #[test]
    fn test_trim_optional_field() {
        assert_eq!(trim_optional_field(Some(&" x ".to_string())), Some("x".to_string()));
        assert_eq!(trim_optional_field(Some(&"  ".to_string())), None);
        assert_eq!(trim_optional_field(None), None);
    }

    #[test]
    fn test_parse_iso_date() {
        let date = parse_iso_date("start_date", "2025-01-10").unwrap();
        assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert!(parse_iso_date("start_date", "10.01.2025")
            .unwrap_err()
            .contains("start_date"));
    }

    #[test]
    fn test_validate_money() {
        use std::str::FromStr;

        let ok = validate_money("amount", &BigDecimal::from_str("1000.005").unwrap()).unwrap();
        assert_eq!(ok, BigDecimal::from_str("1000.01").unwrap());
        assert!(validate_money("amount", &BigDecimal::from(0)).is_err());
        assert!(validate_money("amount", &BigDecimal::from(-5)).is_err());
        assert!(validate_money("amount", &BigDecimal::from_str("0.001").unwrap()).is_err());
        assert!(validate_money("price", &BigDecimal::from(10_000_000_000i64))
            .unwrap_err()
            .contains("price"));
    }
}
