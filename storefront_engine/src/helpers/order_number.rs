use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderNumber;

const SUFFIX_LENGTH: usize = 6;

/// Generates a human-friendly order number of the form `ORD-YYYYMMDD-XXXXXX`.
pub fn new_order_number(now: DateTime<Utc>) -> OrderNumber {
    let suffix = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LENGTH)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect::<String>();
    OrderNumber::from(format!("ORD-{}-{suffix}", now.format("%Y%m%d")))
}

pub fn is_valid_order_number(s: &str) -> bool {
    let mut parts = s.split('-');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("ORD"), Some(date), Some(suffix), None)
            if date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) &&
               suffix.len() == SUFFIX_LENGTH && suffix.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    )
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn order_number_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let n = new_order_number(now);
        assert!(n.as_str().starts_with("ORD-20240309-"), "{n}");
        assert!(is_valid_order_number(n.as_str()), "{n}");
        assert!(!is_valid_order_number("ORD-2024-ABC"));
        assert!(!is_valid_order_number("ORD-20240309-abcdef"));
    }
}
