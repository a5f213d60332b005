use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Result};
use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc,
};

use crate::utils::clock::Clock;

/// Decides which timezone draws the line between two calendar days. Every component that turns
/// an instant into a day must use the same boundary, otherwise streaks and heatmaps disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    /// Timezone of the machine running the program.
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl DayBoundary {
    /// Calendar day `instant` falls on.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Local => instant.with_timezone(&Local).date_naive(),
            DayBoundary::Utc => instant.date_naive(),
            DayBoundary::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    /// First instant of `day`. When a DST transition swallows midnight the day starts at the
    /// earliest local time that exists.
    pub fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        match self {
            DayBoundary::Local => day_start_in(&Local, day),
            DayBoundary::Utc => day_start_in(&Utc, day),
            DayBoundary::Fixed(offset) => day_start_in(offset, day),
        }
    }

    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.day_of(clock.time())
    }
}

fn day_start_in<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(start) => start.to_utc(),
        LocalResult::Ambiguous(earliest, _) => earliest.to_utc(),
        LocalResult::None => (1..24)
            .find_map(|hour| {
                tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                    .earliest()
            })
            .map(|start| start.to_utc())
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

impl Display for DayBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayBoundary::Local => write!(f, "local"),
            DayBoundary::Utc => write!(f, "utc"),
            DayBoundary::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for DayBoundary {
    type Err = anyhow::Error;

    /// Accepts `local`, `utc` or an offset such as `+02:00`, `-0530`, `+3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(DayBoundary::Local);
        }
        if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
            return Ok(DayBoundary::Utc);
        }
        parse_offset(s)
            .map(DayBoundary::Fixed)
            .ok_or_else(|| anyhow!("Can't parse {s} into a day boundary. Use local, utc or +HH:MM"))
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    use super::DayBoundary;

    #[test]
    fn parses_boundaries() {
        assert_eq!("local".parse::<DayBoundary>().unwrap(), DayBoundary::Local);
        assert_eq!("UTC".parse::<DayBoundary>().unwrap(), DayBoundary::Utc);
        assert_eq!(
            "+02:00".parse::<DayBoundary>().unwrap(),
            DayBoundary::Fixed(FixedOffset::east_opt(2 * 3600).unwrap())
        );
        assert_eq!(
            "-0530".parse::<DayBoundary>().unwrap(),
            DayBoundary::Fixed(FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap())
        );
        assert_eq!(
            "+3".parse::<DayBoundary>().unwrap(),
            DayBoundary::Fixed(FixedOffset::east_opt(3 * 3600).unwrap())
        );
        assert!("+25:00".parse::<DayBoundary>().is_err());
        assert!("tomorrow".parse::<DayBoundary>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for value in ["local", "utc", "+02:00", "-05:30"] {
            let boundary = value.parse::<DayBoundary>().unwrap();
            assert_eq!(boundary.to_string(), value);
        }
    }

    #[test]
    fn offset_moves_the_day() {
        // 23:30 UTC is already the next day two hours east.
        let instant = Utc.with_ymd_and_hms(2024, 3, 3, 23, 30, 0).unwrap();
        let east = "+02:00".parse::<DayBoundary>().unwrap();
        let west = "-05:00".parse::<DayBoundary>().unwrap();
        assert_eq!(
            DayBoundary::Utc.day_of(instant),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
        assert_eq!(
            east.day_of(instant),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        assert_eq!(
            west.day_of(instant),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
    }

    #[test]
    fn start_of_maps_back_to_same_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        for boundary in [
            DayBoundary::Local,
            DayBoundary::Utc,
            "+09:00".parse().unwrap(),
            "-11:00".parse().unwrap(),
        ] {
            assert_eq!(boundary.day_of(boundary.start_of(day)), day, "{boundary}");
        }
        let east: DayBoundary = "+02:00".parse().unwrap();
        assert_eq!(east.start_of(day), Utc.with_ymd_and_hms(2024, 3, 30, 22, 0, 0).unwrap());
    }
}
