use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Fixed-width RFC 3339 so string order matches time order in SQL.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Returns a timestamp no earlier than `at` and strictly after `previous`.
pub fn bump_after(previous: &str, at: DateTime<Utc>) -> String {
    match DateTime::parse_from_rfc3339(previous) {
        Ok(prev) => {
            let floor = prev.with_timezone(&Utc) + Duration::microseconds(1);
            format_timestamp(at.max(floor))
        }
        Err(_) => format_timestamp(at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_after_moves_past_future_value() {
        let previous = "2999-01-01T00:00:00.000000Z";
        let bumped = bump_after(previous, Utc::now());
        assert_eq!(bumped, "2999-01-01T00:00:00.000001Z");
    }

    #[test]
    fn test_bump_after_keeps_later_now() {
        let now = Utc::now();
        let bumped = bump_after("2001-01-01T00:00:00.000000Z", now);
        assert_eq!(bumped, format_timestamp(now));
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = format_timestamp(Utc::now());
        let later = bump_after(&earlier, Utc::now());
        assert!(later > earlier);
    }
}
