use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// `d/m/y`, `d-m-y` or `d.m.y`, two or four digit year, optional trailing time.
static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})(?:[ T].*)?$")
        .expect("day-first date pattern should compile")
});

/// ISO-like `yyyy-mm-dd` (also with `/`), optional trailing time.
static YEAR_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[/.\-](\d{1,2})[/.\-](\d{1,2})(?:[ T].*)?$")
        .expect("year-first date pattern should compile")
});

/// Parse a free-text date, reading ambiguous inputs day-first
/// (`01/02/2024` is 1 February). Falls back to month-first only when the
/// day-first reading is not a real date (`02/13/2024`).
pub fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(c) = YEAR_FIRST.captures(s) {
        let year: i32 = c[1].parse().ok()?;
        let month: u32 = c[2].parse().ok()?;
        let day: u32 = c[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let c = DAY_FIRST.captures(s)?;
    let first: u32 = c[1].parse().ok()?;
    let second: u32 = c[2].parse().ok()?;
    let year: i32 = match c[3].len() {
        2 => expand_two_digit_year(c[3].parse().ok()?, Utc::now().year()),
        _ => c[3].parse().ok()?,
    };

    NaiveDate::from_ymd_opt(year, second, first)
        .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
}

/// Place a two-digit year in the century window around `this_year`:
/// within 50 years either side, so `99` is 1999 and `24` is 2024.
fn expand_two_digit_year(yy: i32, this_year: i32) -> i32 {
    let year = this_year - this_year.rem_euclid(100) + yy;
    if year >= this_year + 50 {
        year - 100
    } else if year < this_year - 50 {
        year + 100
    } else {
        year
    }
}

/// `YYYY-MM` bucket key for a date.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ambiguous_dates_are_day_first() {
        assert_eq!(parse_day_first("01/02/2024"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_day_first("05/03/2024").map(month_key).as_deref(), Some("2024-03"));
    }

    #[test]
    fn separators_short_years_and_times() {
        assert_eq!(parse_day_first("5-3-2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_day_first("05.03.24"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_day_first(" 05/03/2024 14:30:00 "), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_day_first("2024-03-05"), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn two_digit_years_use_a_century_window() {
        assert_eq!(expand_two_digit_year(99, 2026), 1999);
        assert_eq!(expand_two_digit_year(24, 2026), 2024);
        assert_eq!(expand_two_digit_year(75, 2026), 2075);
        assert_eq!(expand_two_digit_year(76, 2026), 1976);
        assert_eq!(expand_two_digit_year(10, 2090), 2110);
        assert_eq!(parse_day_first("05/03/99"), Some(ymd(1999, 3, 5)));
    }

    #[test]
    fn month_first_only_when_day_first_is_impossible() {
        assert_eq!(parse_day_first("02/13/2024"), Some(ymd(2024, 2, 13)));
    }

    #[test]
    fn rejects_non_dates() {
        for s in ["", "   ", "a definir", "32/13/2024", "2024", "31/02/2024", "#N/A"] {
            assert_eq!(parse_day_first(s), None, "{:?} should not parse", s);
        }
    }
}
