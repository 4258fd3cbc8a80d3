//! Pool cohort window.
//!
//! Pool cohorts are named by month and year ("march", "2024"). Only cohorts
//! close to the current month are worth syncing.

use chrono::{Datelike, Month, NaiveDate};

/// Parse an English month name ("march", "March") into its number (1..=12).
#[must_use]
pub fn month_number(name: &str) -> Option<u32> {
    name.trim()
        .parse::<Month>()
        .ok()
        .map(|m| m.number_from_month())
}

/// Whether a pool cohort falls within `months` of `today`'s month, inclusive,
/// and belongs to the current year.
///
/// The window is not carried across year boundaries: a cohort from another
/// year is always outside it.
#[must_use]
pub fn in_pool_window(
    pool_month: Option<&str>,
    pool_year: Option<&str>,
    today: NaiveDate,
    months: u32,
) -> bool {
    let Some(month) = pool_month.and_then(month_number) else {
        return false;
    };
    let Some(year) = pool_year.and_then(|y| y.trim().parse::<i32>().ok()) else {
        return false;
    };
    if year != today.year() {
        return false;
    }
    today.month().abs_diff(month) <= months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn march_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn same_year_within_two_months_is_kept() {
        assert!(in_pool_window(Some("january"), Some("2024"), march_15(), 2));
        assert!(in_pool_window(Some("march"), Some("2024"), march_15(), 2));
        assert!(in_pool_window(Some("may"), Some("2024"), march_15(), 2));
    }

    #[test]
    fn other_year_is_dropped() {
        assert!(!in_pool_window(Some("january"), Some("2023"), march_15(), 2));
        assert!(!in_pool_window(Some("march"), Some("2025"), march_15(), 2));
    }

    #[test]
    fn outside_window_is_dropped() {
        assert!(!in_pool_window(Some("june"), Some("2024"), march_15(), 2));
        assert!(!in_pool_window(Some("december"), Some("2024"), march_15(), 2));
    }

    #[test]
    fn missing_or_unknown_fields_are_dropped() {
        assert!(!in_pool_window(None, Some("2024"), march_15(), 2));
        assert!(!in_pool_window(Some("march"), None, march_15(), 2));
        assert!(!in_pool_window(Some("brumaire"), Some("2024"), march_15(), 2));
        assert!(!in_pool_window(Some("march"), Some("twenty"), march_15(), 2));
    }

    #[test]
    fn month_names_are_case_insensitive() {
        assert_eq!(month_number("March"), Some(3));
        assert_eq!(month_number("september"), Some(9));
    }
}
