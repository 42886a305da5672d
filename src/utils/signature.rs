// MD5 signatures of the legacy form-post payment notifications

use bigdecimal::BigDecimal;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Lower-case hex MD5 of the concatenated parts
pub fn md5_hex(parts: &[&str]) -> String {
    format!("{:x}", md5::compute(parts.concat()))
}

/// Normalize a notification amount to two decimals, as it is signed.
/// Returns `None` for anything that is not a number.
pub fn format_sum(raw: &str) -> Option<String> {
    let value = BigDecimal::from_str(raw.trim()).ok()?;
    Some(
        value
            .with_scale_round(2, bigdecimal::RoundingMode::HalfUp)
            .to_string(),
    )
}

/// Expected `key` of a notification: md5(id + sum + clientid + orderid + secret)
pub fn notification_key(
    id: &str,
    sum: &str,
    client_id: &str,
    order_id: &str,
    secret: &str,
) -> String {
    md5_hex(&[id, sum, client_id, order_id, secret])
}

/// Body of the acknowledgement: md5(id + secret)
pub fn acknowledgement_digest(id: &str, secret: &str) -> String {
    md5_hex(&[id, secret])
}

/// Constant-time comparison of a received digest against the expected one
pub fn digest_matches(received: &str, expected: &str) -> bool {
    received.trim().as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_known_vector() {
        assert_eq!(md5_hex(&["abc"]), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(md5_hex(&["a", "b", "c"]), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_format_sum() {
        assert_eq!(format_sum("1000").as_deref(), Some("1000.00"));
        assert_eq!(format_sum("99.5").as_deref(), Some("99.50"));
        assert_eq!(format_sum(" 12.345 ").as_deref(), Some("12.35"));
        assert_eq!(format_sum("ten"), None);
        assert_eq!(format_sum(""), None);
    }

    #[test]
    fn test_notification_key_concatenation_order() {
        let key = notification_key("77", "1000.00", "client@example.com", "15", "s3cret");
        assert_eq!(key, md5_hex(&["771000.00client@example.com15s3cret"]));
    }

    #[test]
    fn test_digest_matches() {
        let expected = acknowledgement_digest("77", "s3cret");
        assert!(digest_matches(&expected, &expected));
        assert!(digest_matches(&format!(" {} ", expected), &expected));
        assert!(!digest_matches(&expected.to_uppercase(), &expected));
        assert!(!digest_matches("deadbeef", &expected));
        assert!(!digest_matches("", &expected));
    }
}
