// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting and WIB day buckets.
//!
//! All "has the user acted today" logic works on day buckets: calendar
//! dates in WIB (UTC+7), formatted `YYYY-MM-DD`. Using one fixed
//! timezone keeps streaks and daily task sets stable across the
//! midnight boundary for users in that locale.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, SecondsFormat, Utc};

/// WIB is UTC+7 with no daylight saving.
const WIB_OFFSET_SECS: i32 = 7 * 3600;

fn wib_offset() -> FixedOffset {
    // In range by construction.
    FixedOffset::east_opt(WIB_OFFSET_SECS).unwrap()
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The WIB calendar date for an instant.
pub fn wib_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&wib_offset()).date_naive()
}

/// Today's day bucket (`YYYY-MM-DD` in WIB).
pub fn today_bucket(now: DateTime<Utc>) -> String {
    wib_date(now).format("%Y-%m-%d").to_string()
}

/// Yesterday's day bucket relative to an instant.
pub fn yesterday_bucket(now: DateTime<Utc>) -> String {
    (wib_date(now) - Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

/// Shift a day bucket by a number of days. Returns `None` for
/// malformed buckets.
pub fn add_days(bucket: &str, days: i64) -> Option<String> {
    let date = NaiveDate::parse_from_str(bucket, "%Y-%m-%d").ok()?;
    Some((date + Duration::days(days)).format("%Y-%m-%d").to_string())
}

/// Deterministic integer seed for a WIB date: `YYYYMMDD` as a number.
/// Every user sees the same seed on the same calendar day.
pub fn date_seed(now: DateTime<Utc>) -> i64 {
    let date = wib_date(now);
    date.year() as i64 * 10000 + date.month() as i64 * 100 + date.day() as i64
}

/// Whole WIB calendar days elapsed from an RFC3339 start timestamp to
/// `now`. Day 0 is the start date itself.
pub fn wib_days_since(start_rfc3339: &str, now: DateTime<Utc>) -> Option<i64> {
    let start = DateTime::parse_from_rfc3339(start_rfc3339)
        .ok()?
        .with_timezone(&Utc);
    Some((wib_date(now) - wib_date(start)).num_days())
}

/// The WIB day bucket of an RFC3339 timestamp string. Returns `None`
/// for malformed timestamps.
pub fn bucket_of(ts: &str) -> Option<String> {
    let instant = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);
    Some(today_bucket(instant))
}

/// UTC instants bounding a WIB day bucket, as RFC3339 strings.
/// Used for "completed yesterday" range queries over timestamps.
pub fn bucket_utc_range(bucket: &str) -> Option<(String, String)> {
    let date = NaiveDate::parse_from_str(bucket, "%Y-%m-%d").ok()?;
    let start_wib = date
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(wib_offset())
        .single()?;
    let start = start_wib.with_timezone(&Utc);
    let end = start + Duration::days(1);
    Some((format_utc_rfc3339(start), format_utc_rfc3339(end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bucket_crosses_midnight_in_wib() {
        // 18:30 UTC is already the next day in WIB (+7).
        let late = Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap();
        assert_eq!(today_bucket(late), "2024-03-11");
        assert_eq!(yesterday_bucket(late), "2024-03-10");

        let early = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        assert_eq!(today_bucket(early), "2024-03-10");
    }

    #[test]
    fn test_date_seed_concatenates_parts() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        assert_eq!(date_seed(now), 20240305);
    }

    #[test]
    fn test_add_days() {
        assert_eq!(add_days("2024-03-01", -1).as_deref(), Some("2024-02-29"));
        assert_eq!(add_days("2024-12-31", 1).as_deref(), Some("2025-01-01"));
        assert_eq!(add_days("not-a-date", 1), None);
    }

    #[test]
    fn test_wib_days_since() {
        let now = Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap();
        assert_eq!(wib_days_since("2024-03-11T12:00:00Z", now), Some(30));
        assert_eq!(wib_days_since("garbage", now), None);
    }

    #[test]
    fn test_bucket_of() {
        // 17:00 UTC is already the next WIB day.
        assert_eq!(bucket_of("2024-03-30T17:00:00Z").as_deref(), Some("2024-03-31"));
        assert_eq!(bucket_of("2024-03-30T16:59:59Z").as_deref(), Some("2024-03-30"));
        assert_eq!(bucket_of("garbage"), None);
    }

    #[test]
    fn test_bucket_utc_range() {
        let (start, end) = bucket_utc_range("2024-03-11").unwrap();
        // WIB midnight is 17:00 UTC the previous day.
        assert_eq!(start, "2024-03-10T17:00:00Z");
        assert_eq!(end, "2024-03-11T17:00:00Z");
    }
}
