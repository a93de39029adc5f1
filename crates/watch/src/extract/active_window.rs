// ABOUTME: Date-window hook: recognise "YYYY.MM.DD ~ YYYY.MM.DD" ranges in titles and drop ended events.
// ABOUTME: Titles without a recognisable range are always kept.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d{2,4})\s*[./-]\s*(\d{1,2})\s*[./-]\s*(\d{1,2})\.?\s*(?:\([^)]*\))?\s*[~∼〜-]\s*(?:(\d{2,4})\s*[./-]\s*)?(\d{1,2})\s*[./-]\s*(\d{1,2})",
    )
    .expect("date range pattern is valid")
});

fn year(raw: &str) -> Option<i32> {
    let y: i32 = raw.parse().ok()?;
    match raw.len() {
        2 => Some(2000 + y),
        4 => Some(y),
        _ => None,
    }
}

/// Parses the first date range in `text`. An end date without a year takes
/// the start year, rolling over when it would precede the start.
pub fn parse_range(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    let caps = RANGE.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let start_year = year(caps.get(1)?.as_str())?;
    let start = NaiveDate::from_ymd_opt(start_year, num(2)?, num(3)?)?;

    let end_year = match caps.get(4) {
        Some(m) => year(m.as_str())?,
        None => start_year,
    };
    let mut end = NaiveDate::from_ymd_opt(end_year, num(5)?, num(6)?)?;
    if caps.get(4).is_none() && end < start {
        end = NaiveDate::from_ymd_opt(end_year + 1, num(5)?, num(6)?)?;
    }
    Some((start, end))
}

/// False only when `title` carries a range that ended before `today`.
pub fn is_active(title: &str, today: NaiveDate) -> bool {
    match parse_range(title) {
        Some((_, end)) => end >= today,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_full_range_with_dots() {
        assert_eq!(
            parse_range("봄맞이 이벤트 2024.03.01 ~ 2024.03.31"),
            Some((d(2024, 3, 1), d(2024, 3, 31)))
        );
    }

    #[test]
    fn test_dashes_slashes_and_short_years() {
        assert_eq!(
            parse_range("24-05-01 ~ 24/05/20 쿠폰"),
            Some((d(2024, 5, 1), d(2024, 5, 20)))
        );
    }

    #[test]
    fn test_end_without_year_uses_start_year() {
        assert_eq!(
            parse_range("기간: 2024.06.10(월) ~ 06.30"),
            Some((d(2024, 6, 10), d(2024, 6, 30)))
        );
        assert_eq!(
            parse_range("2024.12.20 ~ 01.05"),
            Some((d(2024, 12, 20), d(2025, 1, 5)))
        );
    }

    #[test]
    fn test_ended_events_are_inactive() {
        let today = d(2024, 4, 2);
        assert!(!is_active("2024.03.01 ~ 2024.03.31", today));
        assert!(is_active("2024.03.01 ~ 2024.04.02", today));
        assert!(is_active("상시 이벤트", today));
    }

    #[test]
    fn test_invalid_dates_are_ignored() {
        assert_eq!(parse_range("2024.13.01 ~ 2024.14.01"), None);
        assert!(is_active("2024.13.01 ~ 2024.14.01", d(2030, 1, 1)));
    }
}
