//! Human timeframes ("7d", "yesterday", "2026-01-31") to absolute cutoffs.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Resolve `input` relative to `now`.
///
/// Accepts `Nd`, `Nh`, `Nw`, `today`, `yesterday`, RFC 3339 timestamps and
/// `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timeframe(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();

    match lower.as_str() {
        "" => return Err("timeframe must not be empty".into()),
        "today" => return Ok(midnight),
        "yesterday" => return Ok(midnight - Duration::days(1)),
        _ => {}
    }

    if let Some(span) = relative_span(&lower) {
        return Ok(now - span);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(format!(
        "unrecognized timeframe {input:?} (try 7d, 24h, 2w, today, yesterday or YYYY-MM-DD)"
    ))
}

fn relative_span(lower: &str) -> Option<Duration> {
    let unit = lower.chars().last()?;
    let count: i64 = lower[..lower.len() - unit.len_utf8()].trim().parse().ok()?;
    if count < 0 {
        return None;
    }
    match unit {
        'h' => Some(Duration::hours(count)),
        'd' => Some(Duration::days(count)),
        'w' => Some(Duration::weeks(count)),
        _ => None,
    }
}
