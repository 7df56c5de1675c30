use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Weekdays only; exchange holidays are not modelled.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Move `days` trading days forward from `date`, skipping weekends.
pub fn add_trading_days(date: NaiveDate, days: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = days;
    while remaining > 0 {
        current += Duration::days(1);
        if is_trading_day(current) {
            remaining -= 1;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_weekday_detection() {
        assert!(is_trading_day(d(2025, 3, 7))); // Friday
        assert!(!is_trading_day(d(2025, 3, 8)));
        assert!(!is_trading_day(d(2025, 3, 9)));
    }

    #[test]
    fn test_add_trading_days_skips_weekend() {
        // Wednesday + 5 -> next Wednesday
        assert_eq!(add_trading_days(d(2025, 3, 5), 5), d(2025, 3, 12));
        // Friday + 1 -> Monday
        assert_eq!(add_trading_days(d(2025, 3, 7), 1), d(2025, 3, 10));
        // Saturday + 1 -> Monday
        assert_eq!(add_trading_days(d(2025, 3, 8), 1), d(2025, 3, 10));
        assert_eq!(add_trading_days(d(2025, 3, 5), 0), d(2025, 3, 5));
    }
}
