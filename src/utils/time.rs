use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Parses the `yyyy-mm-dd` names dates go by in habitgrid. Returns `None` for anything else.
pub fn record_name_to_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// First and last day of a calendar year, or `None` when the year can't be represented.
pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

pub fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}

/// Returns the day the week containing `date` starts on.
pub fn week_start_of(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let days_in = 7 + date.weekday().num_days_from_sunday() - week_start.num_days_from_sunday();
    date.checked_sub_days(Days::new((days_in % 7) as u64)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Weekday};

    use super::{days_in_year, record_name_to_date, week_start_of, year_bounds};

    #[test]
    fn week_start_sunday_and_monday() {
        // 2024-03-06 is a Wednesday
        let date = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        assert_eq!(
            week_start_of(date, Weekday::Sun),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
        assert_eq!(
            week_start_of(date, Weekday::Mon),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        assert_eq!(week_start_of(sunday, Weekday::Sun), sunday);
        assert_eq!(
            week_start_of(sunday, Weekday::Mon),
            NaiveDate::from_ymd_opt(2024, 2, 26).unwrap()
        );
    }

    #[test]
    fn record_names() {
        assert_eq!(
            record_name_to_date("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(record_name_to_date("2023-02-29"), None);
        assert_eq!(record_name_to_date("yesterday"), None);
    }

    #[test]
    fn year_shapes() {
        assert_eq!(days_in_year(2024), 366);
        assert_eq!(days_in_year(2023), 365);
        assert_eq!(days_in_year(1900), 365);
        assert!(year_bounds(2024).is_some());
        assert!(year_bounds(i32::MAX).is_none());
    }
}
