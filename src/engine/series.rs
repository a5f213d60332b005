use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::utils::{
    percentage::{ratio_percentage, Percentage},
    time::{record_name_to_date, year_bounds},
};

use super::{day::DayBoundary, streak::CompletionEvent};

/// Number of completions per calendar day. Days that never appear count as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySeries(BTreeMap<NaiveDate, u32>);

impl DaySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, day: NaiveDate, count: u32) {
        let entry = self.0.entry(day).or_default();
        *entry = entry.saturating_add(count);
    }

    pub fn count(&self, day: NaiveDate) -> u32 {
        self.0.get(&day).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.0.iter().map(|(day, count)| (*day, *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.0.values().fold(0, |sum, count| sum.saturating_add(*count))
    }

    pub fn max_count(&self) -> u32 {
        self.0.values().copied().max().unwrap_or(0)
    }

    /// Counts completed events per day. Each item contributes at most once per day.
    pub fn from_events<'a>(
        events: impl IntoIterator<Item = &'a CompletionEvent>,
        boundary: DayBoundary,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut series = Self::new();
        for event in events.into_iter().filter(|event| event.completed) {
            let day = boundary.day_of(event.occurred_at);
            if seen.insert((event.item_id.clone(), day)) {
                series.add(day, 1);
            }
        }
        series
    }

    /// Builds a series out of `("yyyy-mm-dd", count)` pairs. Repeated days are summed and
    /// malformed dates are dropped.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut series = Self::new();
        for (date, count) in entries {
            match record_name_to_date(date) {
                Some(day) => series.add(day, count),
                None => warn!("Skipping series entry with malformed date {date:?}"),
            }
        }
        series
    }

    /// Keeps only the days of `year`.
    pub fn within_year(&self, year: i32) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(day, _)| day.year() == year)
                .map(|(day, count)| (*day, *count))
                .collect(),
        )
    }

    /// Days in `[start, end]` with at least one completion.
    pub fn active_days_between(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        if start > end {
            return 0;
        }
        self.0
            .range(start..=end)
            .filter(|(_, count)| **count > 0)
            .count() as u32
    }

    /// Share of the elapsed days of `year` (up to and including `today`) that have a completion.
    pub fn consistency(&self, year: i32, today: NaiveDate) -> Percentage {
        let Some((first, last)) = year_bounds(year) else {
            return Percentage::zero();
        };
        let end = last.min(today);
        if end < first {
            return Percentage::zero();
        }
        let elapsed = (end - first).num_days() as u32 + 1;
        ratio_percentage(self.active_days_between(first, end), elapsed)
    }
}

impl FromIterator<(NaiveDate, u32)> for DaySeries {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, u32)>>(iter: T) -> Self {
        let mut series = Self::new();
        for (day, count) in iter {
            series.add(day, count);
        }
        series
    }
}

/// Sums two series day by day. The result holds every day present in either input.
pub fn merge_series(a: &DaySeries, b: &DaySeries) -> DaySeries {
    let mut merged = a.clone();
    for (day, count) in b.iter() {
        merged.add(day, count);
    }
    merged
}

pub fn merge_all<'a>(series: impl IntoIterator<Item = &'a DaySeries>) -> DaySeries {
    series
        .into_iter()
        .fold(DaySeries::new(), |merged, next| merge_series(&merged, next))
}
