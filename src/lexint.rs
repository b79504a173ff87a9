//! Order-preserving integer encoding for index keys
//!
//! Timestamps are written as 16 lower-case hex digits (big-endian u64), so
//! byte order of the encoded strings matches numeric order and one shared
//! index can be range-scanned by time.

use chrono::{DateTime, Utc};

/// Width of an encoded value in characters
pub const ENCODED_WIDTH: usize = 16;

/// Encode an integer as a fixed-width, lexicographically ordered string
pub fn encode(value: u64) -> String {
    format!("{:016x}", value)
}

/// Decode a string produced by [`encode`]
pub fn decode(encoded: &str) -> Option<u64> {
    let digits = encoded.get(..ENCODED_WIDTH)?;
    u64::from_str_radix(digits, 16).ok()
}

/// Encode a timestamp as Unix milliseconds. Pre-epoch times clamp to zero.
pub fn encode_time(time: &DateTime<Utc>) -> String {
    encode(time.timestamp_millis().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_width() {
        assert_eq!(encode(0).len(), ENCODED_WIDTH);
        assert_eq!(encode(u64::MAX).len(), ENCODED_WIDTH);
        assert_eq!(encode(255), "00000000000000ff");
    }

    #[test]
    fn test_order_preserved() {
        let values = [0u64, 1, 9, 10, 255, 256, 1_700_000_000_000, 1_700_000_000_001];
        for pair in values.windows(2) {
            assert!(encode(pair[0]) < encode(pair[1]), "{} vs {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_decode_ignores_suffix() {
        let ms = 1_700_000_000_123;
        let key = format!("{}0003", encode(ms));
        assert_eq!(decode(&key), Some(ms));
        assert_eq!(decode("xyz"), None);
    }

    #[test]
    fn test_encode_time() {
        let time = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(decode(&encode_time(&time)), Some(1_700_000_000_000));
    }
}
