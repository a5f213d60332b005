use chrono::{DateTime, Days, NaiveDate, Utc, Weekday};
use serde::Serialize;

use crate::utils::time::week_start_of;

use super::day::DayBoundary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FocusSession {
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

/// How focus time this week compares to the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusMomentum {
    pub this_week_count: u32,
    pub last_week_count: u32,
    /// `today - 6 ..= today`, oldest first.
    pub last_7_days: [NaiveDate; 7],
    pub last_7_days_minutes: [u32; 7],
}

impl FocusMomentum {
    pub fn difference(&self) -> i64 {
        self.this_week_count as i64 - self.last_week_count as i64
    }

    pub fn total_minutes(&self) -> u32 {
        self.last_7_days_minutes
            .iter()
            .fold(0, |sum, minutes| sum.saturating_add(*minutes))
    }
}

pub fn focus_momentum<'a>(
    sessions: impl IntoIterator<Item = &'a FocusSession>,
    today: NaiveDate,
    boundary: DayBoundary,
    week_start: Weekday,
) -> FocusMomentum {
    let this_week = week_start_of(today, week_start);
    let last_week = this_week.checked_sub_days(Days::new(7));

    let mut last_7_days = [today; 7];
    for (index, day) in last_7_days.iter_mut().enumerate() {
        *day = today
            .checked_sub_days(Days::new(6 - index as u64))
            .unwrap_or(today);
    }

    let mut momentum = FocusMomentum {
        this_week_count: 0,
        last_week_count: 0,
        last_7_days,
        last_7_days_minutes: [0; 7],
    };

    for session in sessions {
        let day = boundary.day_of(session.started_at);
        if day > today {
            continue;
        }
        if day >= this_week {
            momentum.this_week_count += 1;
        } else if last_week.is_some_and(|start| day >= start) {
            momentum.last_week_count += 1;
        }

        if let Some(index) = last_7_days.iter().position(|d| *d == day) {
            let minutes = &mut momentum.last_7_days_minutes[index];
            *minutes = minutes.saturating_add(session.duration_minutes);
        }
    }
    momentum
}
