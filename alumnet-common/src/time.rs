//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch for a timestamp
///
/// Pre-epoch timestamps clamp to zero.
pub fn unix_millis(timestamp: DateTime<Utc>) -> u64 {
    timestamp.timestamp_millis().max(0) as u64
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Age of a timestamp relative to `now`
///
/// Returns `None` when the timestamp lies in the future (clock skew between
/// the writer and the reader).
pub fn age_of(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Option<chrono::Duration> {
    let age = now.signed_duration_since(timestamp);
    if age < chrono::Duration::zero() {
        None
    } else {
        Some(age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_unix_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(unix_millis(ts), 1_704_067_200_000);
    }

    #[test]
    fn test_unix_millis_pre_epoch_clamps() {
        let ts = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(unix_millis(ts), 0);
    }

    #[test]
    fn test_millis_to_duration() {
        assert_eq!(millis_to_duration(0), Duration::ZERO);
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
        assert_eq!(millis_to_duration(3_600_000), Duration::from_secs(3600));
    }

    #[test]
    fn test_age_of_past_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let then = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(age_of(then, now), Some(chrono::Duration::days(9)));
    }

    #[test]
    fn test_age_of_future_timestamp_is_none() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(age_of(later, now), None);
    }
}
