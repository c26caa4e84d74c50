/// Time & ID utilities.
///
/// Monotonic-ish nanosecond timestamps, stable content hashes for idempotent
/// upserts, and RFC3339 formatting shared by every other component.
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A nanosecond-resolution Unix timestamp, as used throughout every node and
/// edge attribute (`firstSeen`, `lastSeen`, `firstObserved`, ...).
pub type NanoTime = i64;

/// Current wall-clock time in nanoseconds since the Unix epoch.
pub fn now_ns() -> NanoTime {
    Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1_000)
}

/// Convert a nanosecond timestamp to an RFC3339 string.
pub fn to_rfc3339(ns: NanoTime) -> String {
    DateTime::<Utc>::from_timestamp(ns / 1_000_000_000, (ns % 1_000_000_000) as u32)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// Parse an RFC3339 string into a nanosecond timestamp.
pub fn from_rfc3339(s: &str) -> Option<NanoTime> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .and_then(|dt| dt.with_timezone(&Utc).timestamp_nanos_opt())
}

/// Accept a Unix timestamp in either seconds or milliseconds and
/// normalize it to nanoseconds. Values below `1_000_000_000_000` (year
/// ~2001 in ms, or far future in seconds) are treated as seconds.
pub fn normalize_unix_to_ns(value: i64) -> NanoTime {
    if value.abs() < 10_000_000_000 {
        value * 1_000_000_000
    } else if value.abs() < 10_000_000_000_000 {
        value * 1_000_000
    } else {
        value
    }
}

/// A stable content hash over canonical fields, used as the idempotency key
/// for graph upserts and carried by every node/edge as `content_hash`.
pub fn content_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_seconds_vs_millis() {
        let secs = 1_700_000_000i64;
        let millis = secs * 1000;
        assert_eq!(normalize_unix_to_ns(secs), secs * 1_000_000_000);
        assert_eq!(normalize_unix_to_ns(millis), secs * 1_000_000_000);
    }

    #[test]
    fn content_hash_deterministic() {
        let a = content_hash(&["Pod", "default", "web-1"]);
        let b = content_hash(&["Pod", "default", "web-1"]);
        let c = content_hash(&["Pod", "default", "web-2"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rfc3339_roundtrip() {
        let ns = 1_700_000_000_123_456_789i64;
        let s = to_rfc3339(ns);
        let back = from_rfc3339(&s).unwrap();
        // Sub-second precision beyond what RFC3339 formatting keeps may be lost;
        // compare at the second level.
        assert_eq!(ns / 1_000_000_000, back / 1_000_000_000);
    }
}
