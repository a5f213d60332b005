use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::day::DayBoundary;

/// One instance of a trackable item being marked done, or a retraction of it when `completed` is
/// false. Several events may exist for the same day in a log; only the latest one counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionEvent {
    pub item_id: Arc<str>,
    pub occurred_at: DateTime<Utc>,
    pub completed: bool,
}

/// What callers display for an item: the current streak and whether today is already done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StreakState {
    pub count: u32,
    pub completed_today: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
    pub total_days: u32,
    pub last_completed: Option<NaiveDate>,
}

/// Outcome of flipping the completion of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionResult {
    pub day: NaiveDate,
    pub now_completed: bool,
    pub previous_streak: u32,
    pub streak: u32,
    /// Direction the streak moved in: -1, 0 or 1.
    pub streak_delta: i8,
}

/// Computes streaks from completion histories. Holds no state besides the day boundary, every
/// answer is recomputed from the events it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreakEngine {
    boundary: DayBoundary,
}

impl StreakEngine {
    pub fn new(boundary: DayBoundary) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    /// Distinct days with a completed event, most recent first.
    pub fn completed_days<'a>(
        &self,
        events: impl IntoIterator<Item = &'a CompletionEvent>,
    ) -> Vec<NaiveDate> {
        let days = events
            .into_iter()
            .filter(|event| event.completed)
            .map(|event| self.boundary.day_of(event.occurred_at))
            .collect::<BTreeSet<_>>();
        days.into_iter().rev().collect()
    }

    /// Number of consecutive days ending at `today` that have a completion. A day that hasn't
    /// been completed yet breaks the streak, even while it is still in progress.
    pub fn compute_streak<'a>(
        &self,
        events: impl IntoIterator<Item = &'a CompletionEvent>,
        today: NaiveDate,
    ) -> u32 {
        let mut expected = today;
        let mut count = 0;
        // Days after today can come from a boundary change or a skewed clock. They neither count
        // nor break the walk.
        for day in self
            .completed_days(events)
            .into_iter()
            .skip_while(|day| *day > today)
        {
            if day != expected {
                break;
            }
            count += 1;
            match expected.pred_opt() {
                Some(previous) => expected = previous,
                None => break,
            }
        }
        count
    }

    pub fn is_completed_on<'a>(
        &self,
        events: impl IntoIterator<Item = &'a CompletionEvent>,
        day: NaiveDate,
    ) -> bool {
        events
            .into_iter()
            .any(|event| event.completed && self.boundary.day_of(event.occurred_at) == day)
    }

    pub fn status(&self, events: &[CompletionEvent], today: NaiveDate) -> StreakState {
        StreakState {
            count: self.compute_streak(events, today),
            completed_today: self.is_completed_on(events, today),
        }
    }

    pub fn summarize(&self, events: &[CompletionEvent], today: NaiveDate) -> StreakSummary {
        let mut days = self.completed_days(events);
        days.reverse();

        let mut longest = 0;
        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;
        for day in &days {
            run = match previous {
                Some(previous) if previous.succ_opt() == Some(*day) => run + 1,
                _ => 1,
            };
            longest = u32::max(longest, run);
            previous = Some(*day);
        }

        StreakSummary {
            current: self.compute_streak(events, today),
            longest,
            total_days: days.len() as u32,
            last_completed: days.last().copied(),
        }
    }

    /// Flips the completion of `day` for `item_id` inside `history`. A completed day is removed,
    /// a missing one is added. The streak is recomputed from the mutated history.
    pub fn toggle(
        &self,
        history: &mut Vec<CompletionEvent>,
        item_id: &str,
        day: NaiveDate,
        today: NaiveDate,
    ) -> TransitionResult {
        let previous_streak = self.item_streak(history, item_id, today);

        let belongs = |event: &CompletionEvent| {
            &*event.item_id == item_id && self.boundary.day_of(event.occurred_at) == day
        };
        let was_completed = history
            .iter()
            .any(|event| event.completed && belongs(event));

        history.retain(|event| !belongs(event));
        if !was_completed {
            history.push(CompletionEvent {
                item_id: item_id.into(),
                occurred_at: self.boundary.start_of(day),
                completed: true,
            });
        }

        let streak = self.item_streak(history, item_id, today);
        TransitionResult {
            day,
            now_completed: !was_completed,
            previous_streak,
            streak,
            streak_delta: match streak.cmp(&previous_streak) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            },
        }
    }

    /// Folds a log of completions and retractions into the events that are in effect: the last
    /// entry for every `(item, day)` pair wins and only completed ones are kept. The result is
    /// ordered by item and day.
    pub fn project(&self, log: impl IntoIterator<Item = CompletionEvent>) -> Vec<CompletionEvent> {
        let mut latest = HashMap::<(Arc<str>, NaiveDate), CompletionEvent>::new();
        for event in log {
            let key = (event.item_id.clone(), self.boundary.day_of(event.occurred_at));
            latest.insert(key, event);
        }

        let mut effective = latest
            .into_iter()
            .filter(|(_, event)| event.completed)
            .collect::<Vec<_>>();
        effective.sort_by(|(a, _), (b, _)| a.cmp(b));
        effective.into_iter().map(|(_, event)| event).collect()
    }

    fn item_streak(&self, history: &[CompletionEvent], item_id: &str, today: NaiveDate) -> u32 {
        self.compute_streak(
            history.iter().filter(|event| &*event.item_id == item_id),
            today,
        )
    }
}
