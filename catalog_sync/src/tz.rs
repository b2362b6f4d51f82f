//! Timestamp helpers. All database timestamps are RFC-3339 UTC strings with millisecond
//! precision, e.g. `"2025-06-01T09:30:00.000Z"`.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC instant the way every `*_at` column stores it.
pub fn to_rfc3339_millis(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time formatted by [`to_rfc3339_millis`].
pub fn now_rfc3339_millis() -> String {
    to_rfc3339_millis(Utc::now())
}

/// RFC-3339 with offset -> UTC.
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn millis_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap();
        let s = to_rfc3339_millis(ts);
        assert_eq!(s, "2024-03-10T14:30:00.000Z");
        assert_eq!(parse_ts_to_utc(&s).unwrap(), ts);
        assert_eq!(parse_ts_to_utc("2024-03-10T09:30:00-05:00").unwrap(), ts);
    }
}
