//! Timestamp formats the API insists on.
//!
//! Two near-ISO-8601 variants appear in headers and signatures:
//! - `java_like`: 2-digit fractional seconds with a `+HH:MM` offset,
//!   matching what the official Android client emits.
//! - `gmt7_no_colon`: the value converted to GMT+7 with 3-digit millis
//!   and a `+0700` offset, used for OTP signing.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// The carrier's home timezone (GMT+7).
pub fn gmt7() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap()
}

/// Current time in GMT+7.
pub fn gmt7_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&gmt7())
}

/// `2024-01-02T03:04:05.67+07:00` - fractional seconds truncated to two
/// digits, offset with a colon.
pub fn java_like_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let centis = dt.timestamp_subsec_millis() / 10;
    format!(
        "{}.{:02}{}",
        dt.format("%Y-%m-%dT%H:%M:%S"),
        centis,
        dt.format("%:z")
    )
}

/// `2024-01-02T03:04:05.678+0700` - converted to GMT+7, 3-digit millis,
/// offset without a colon.
pub fn ts_gmt7_no_colon<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    let local = dt.with_timezone(&gmt7());
    format!(
        "{}.{:03}+0700",
        local.format("%Y-%m-%dT%H:%M:%S"),
        local.timestamp_subsec_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn java_like_truncates_to_centiseconds() {
        let dt = gmt7().with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(678);
        assert_eq!(java_like_timestamp(&dt), "2024-01-02T03:04:05.67+07:00");
    }

    #[test]
    fn gmt7_no_colon_converts_from_utc() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap()
            + chrono::Duration::milliseconds(5);
        // 20:00 UTC is 03:00 the next day in GMT+7
        assert_eq!(ts_gmt7_no_colon(&dt), "2024-01-02T03:00:00.005+0700");
    }

    #[test]
    fn zero_millis_keeps_fixed_width() {
        let dt = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(ts_gmt7_no_colon(&dt).ends_with(".000+0700"));
        let local = dt.with_timezone(&gmt7());
        assert!(java_like_timestamp(&local).contains(".00+07:00"));
    }
}
