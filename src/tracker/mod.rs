//! The tracker glues storage, the clock and the engine together. Every operation reads what it
//! needs from storage, recomputes derived values from scratch and writes back the result.
//!
//! Toggles are plain read-modify-write round trips without any version check, two processes
//! toggling the same item at once end up with whichever write landed last.

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, ensure, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use futures::try_join;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{
    engine::{
        day::DayBoundary,
        momentum::{focus_momentum, FocusMomentum, FocusSession},
        series::{merge_all, merge_series, DaySeries},
        streak::{CompletionEvent, StreakEngine, StreakState, StreakSummary, TransitionResult},
    },
    storage::{
        entities::{make_item_id, CompletionEntity, FocusSessionEntity, ItemEntity, ItemKind},
        tracker_storage::TrackerStorage,
    },
    utils::{clock::Clock, percentage::Percentage},
};

/// Longest focus session accepted by [Tracker::log_focus].
pub const MAX_FOCUS_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStatus {
    pub item: ItemEntity,
    pub state: StreakState,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub items: Vec<ItemStatus>,
    #[serde(skip)]
    pub habits: DaySeries,
    #[serde(skip)]
    pub tasks: DaySeries,
    #[serde(skip)]
    pub overall: DaySeries,
    pub consistency: Percentage,
    pub momentum: FocusMomentum,
}

pub struct Tracker<S: TrackerStorage> {
    storage: S,
    clock: Box<dyn Clock>,
    engine: StreakEngine,
    week_start: Weekday,
}

impl<S: TrackerStorage> Tracker<S> {
    pub fn new(
        storage: S,
        clock: Box<dyn Clock>,
        boundary: DayBoundary,
        week_start: Weekday,
    ) -> Self {
        Self {
            storage,
            clock,
            engine: StreakEngine::new(boundary),
            week_start,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    pub fn today(&self) -> NaiveDate {
        self.engine.boundary().today(self.clock.as_ref())
    }

    pub fn boundary(&self) -> DayBoundary {
        self.engine.boundary()
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    #[instrument(skip(self))]
    pub async fn create_item(
        &self,
        title: &str,
        kind: ItemKind,
        category: Option<String>,
    ) -> Result<ItemEntity> {
        let title = title.trim();
        ensure!(!title.is_empty(), "Item title can't be empty");

        let (items, log) = try_join!(self.storage.items(), self.storage.completions(None))?;
        // Ids still present in the log are taken too, their history must not leak into a new item.
        let taken = items
            .iter()
            .map(|item| &*item.id)
            .chain(log.iter().map(|entry| &*entry.item_id));
        let id = make_item_id(title, taken);
        let item = ItemEntity {
            id,
            title: title.to_owned(),
            kind,
            category: category.filter(|category| !category.trim().is_empty()),
            created_at: self.clock.time(),
            streak: 0,
        };
        self.storage.save_item(item.clone()).await?;
        info!("Created {} {}", item.kind, item.id);
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: &str) -> Result<()> {
        ensure!(self.storage.remove_item(id).await?, "Unknown item {id}");
        info!("Removed {id}");
        Ok(())
    }

    pub async fn items(&self) -> Result<Vec<ItemEntity>> {
        self.storage.items().await
    }

    async fn find_item(&self, id: &str) -> Result<ItemEntity> {
        self.storage
            .item(id)
            .await?
            .ok_or_else(|| anyhow!("Unknown item {id}"))
    }

    /// Completion events of `id` that are currently in effect.
    pub async fn history(&self, id: &str) -> Result<Vec<CompletionEvent>> {
        let log = self.storage.completions(Some(id)).await?;
        Ok(self.engine.project(log.into_iter().map(Into::into)))
    }

    /// Flips the completion of `id` on `day`, today when not given. A task that already has a
    /// completion gets it retracted no matter which day is passed.
    #[instrument(skip(self))]
    pub async fn toggle(&self, id: &str, day: Option<NaiveDate>) -> Result<TransitionResult> {
        let item = self.find_item(id).await?;
        let mut history = self.history(id).await?;
        let today = self.today();

        let day = match item.kind {
            ItemKind::Habit => day.unwrap_or(today),
            ItemKind::Task => history
                .iter()
                .max_by_key(|event| event.occurred_at)
                .map(|latest| self.boundary().day_of(latest.occurred_at))
                .or(day)
                .unwrap_or(today),
        };

        let result = self.engine.toggle(&mut history, id, day, today);
        self.storage
            .append_completion(CompletionEntity {
                item_id: item.id.clone(),
                at: self.boundary().start_of(day),
                completed: result.now_completed,
            })
            .await?;

        if item.streak != result.streak {
            self.storage
                .save_item(ItemEntity {
                    streak: result.streak,
                    ..item
                })
                .await?;
        }

        info!(
            "Toggled {id} on {day}: completed {}, streak {} -> {}",
            result.now_completed, result.previous_streak, result.streak
        );
        Ok(result)
    }

    pub async fn status(&self, id: &str) -> Result<ItemStatus> {
        let item = self.find_item(id).await?;
        let history = self.history(id).await?;
        Ok(ItemStatus {
            state: self.engine.status(&history, self.today()),
            item,
        })
    }

    pub async fn summary(&self, id: &str) -> Result<StreakSummary> {
        self.find_item(id).await?;
        let history = self.history(id).await?;
        Ok(self.engine.summarize(&history, self.today()))
    }

    /// Every item with its recomputed state. Stored streaks that drifted, for example because a
    /// day passed since the last toggle, are written back.
    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<Vec<ItemStatus>> {
        let (items, log) = try_join!(self.storage.items(), self.storage.completions(None))?;
        let today = self.today();

        let mut histories = HashMap::<_, Vec<_>>::new();
        for event in self.engine.project(log.into_iter().map(Into::into)) {
            histories.entry(event.item_id.clone()).or_default().push(event);
        }

        let mut statuses = Vec::with_capacity(items.len());
        for item in items {
            let history = histories.remove(&item.id).unwrap_or_default();
            let state = self.engine.status(&history, today);
            let item = if item.streak != state.count {
                debug!("Streak of {} drifted {} -> {}", item.id, item.streak, state.count);
                let item = ItemEntity {
                    streak: state.count,
                    ..item
                };
                self.storage.save_item(item.clone()).await?;
                item
            } else {
                item
            };
            statuses.push(ItemStatus { item, state });
        }
        Ok(statuses)
    }

    async fn series_of(&self, kind: Option<ItemKind>, year: i32) -> Result<DaySeries> {
        let (items, log) = try_join!(self.storage.items(), self.storage.completions(None))?;
        let ids = items
            .iter()
            .filter(|item| kind.map_or(true, |kind| item.kind == kind))
            .map(|item| item.id.clone())
            .collect::<HashSet<_>>();
        let effective = self
            .engine
            .project(log.into_iter().map(Into::into))
            .into_iter()
            .filter(|event| ids.contains(&event.item_id))
            .collect::<Vec<_>>();
        Ok(DaySeries::from_events(&effective, self.boundary()).within_year(year))
    }

    pub async fn habit_series(&self, year: i32) -> Result<DaySeries> {
        self.series_of(Some(ItemKind::Habit), year).await
    }

    pub async fn task_series(&self, year: i32) -> Result<DaySeries> {
        self.series_of(Some(ItemKind::Task), year).await
    }

    pub async fn overall_series(&self, year: i32) -> Result<DaySeries> {
        let (habits, tasks) = try_join!(self.habit_series(year), self.task_series(year))?;
        Ok(merge_all([&habits, &tasks]))
    }

    /// Records a focus session of `minutes` that ended now.
    #[instrument(skip(self))]
    pub async fn log_focus(&self, minutes: u32) -> Result<FocusSession> {
        ensure!(
            (1..=MAX_FOCUS_MINUTES).contains(&minutes),
            "Focus session should last between 1 and {MAX_FOCUS_MINUTES} minutes, got {minutes}"
        );
        let entity = FocusSessionEntity {
            started_at: self.clock.time() - Duration::minutes(minutes as i64),
            minutes,
        };
        self.storage.append_focus_session(entity.clone()).await?;
        info!("Logged {minutes} minutes of focus");
        Ok(entity.into())
    }

    pub async fn focus_momentum(&self) -> Result<FocusMomentum> {
        let sessions = self
            .storage
            .focus_sessions()
            .await?
            .into_iter()
            .map(FocusSession::from)
            .collect::<Vec<_>>();
        Ok(focus_momentum(
            &sessions,
            self.today(),
            self.boundary(),
            self.week_start,
        ))
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, year: i32) -> Result<Dashboard> {
        // The overview may rewrite items, fs4 locks block the thread so it can't share a join
        // with readers of the same file.
        let items = self.overview().await?;
        let (habits, tasks, momentum) = try_join!(
            self.habit_series(year),
            self.task_series(year),
            self.focus_momentum(),
        )?;
        let today = self.today();
        let overall = merge_series(&habits, &tasks);
        Ok(Dashboard {
            today,
            items,
            consistency: overall.consistency(year, today),
            habits,
            tasks,
            overall,
            momentum,
        })
    }

    /// Drops superseded and orphaned completion entries from the log.
    pub async fn compact(&self) -> Result<usize> {
        self.storage.compact(self.boundary()).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc, Weekday};
    use tempfile::tempdir;

    use super::Tracker;
    use crate::{
        engine::day::DayBoundary,
        storage::{
            entities::{CompletionEntity, ItemKind},
            tracker_storage::{FileStorage, TrackerStorage},
        },
        utils::{clock::MockClock, logging::TEST_LOGGING},
    };

    const TODAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();

    fn noon(day: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
    }

    fn clock_at(time: DateTime<Utc>) -> Box<MockClock> {
        let mut clock = MockClock::new();
        clock.expect_time().return_const(time);
        Box::new(clock)
    }

    fn tracker<S: TrackerStorage>(storage: S, time: DateTime<Utc>) -> Tracker<S> {
        Tracker::new(storage, clock_at(time), DayBoundary::Utc, Weekday::Sun)
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[tokio::test]
    async fn toggles_persist_recomputed_streak() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        let tracker = tracker(&storage, noon(TODAY));

        let item = tracker.create_item("Read", ItemKind::Habit, None).await?;
        for day in 1..=3 {
            tracker.toggle(&item.id, Some(march(day))).await?;
        }
        assert_eq!(storage.item(&item.id).await?.map(|item| item.streak), Some(3));

        let status = tracker.status(&item.id).await?;
        assert_eq!(status.state.count, 3);
        assert!(status.state.completed_today);

        let result = tracker.toggle(&item.id, None).await?;
        assert!(!result.now_completed);
        assert_eq!(result.streak, 0);
        assert_eq!(result.streak_delta, -1);
        assert_eq!(storage.item(&item.id).await?.map(|item| item.streak), Some(0));

        let summary = tracker.summary(&item.id).await?;
        assert_eq!(summary.longest, 2);
        assert_eq!(summary.total_days, 2);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_items_are_errors() -> Result<()> {
        let dir = tempdir()?;
        let tracker = tracker(FileStorage::new(dir.path().to_owned())?, noon(TODAY));
        assert!(tracker.toggle("missing", None).await.is_err());
        assert!(tracker.status("missing").await.is_err());
        assert!(tracker.delete_item("missing").await.is_err());
        assert!(tracker.create_item("  ", ItemKind::Task, None).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn tasks_retract_their_latest_completion() -> Result<()> {
        let dir = tempdir()?;
        let tracker = tracker(FileStorage::new(dir.path().to_owned())?, noon(TODAY));
        let task = tracker.create_item("File taxes", ItemKind::Task, Some("admin".into())).await?;

        let done = tracker.toggle(&task.id, Some(march(1))).await?;
        assert!(done.now_completed);

        let undone = tracker.toggle(&task.id, None).await?;
        assert!(!undone.now_completed);
        assert_eq!(undone.day, march(1));
        assert!(tracker.history(&task.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn overview_refreshes_drifted_streaks() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        let yesterday = tracker(&storage, noon(TODAY));
        let item = yesterday.create_item("Walk", ItemKind::Habit, None).await?;
        yesterday.toggle(&item.id, None).await?;

        // A day later nothing was done yet, the stored streak of 1 is stale.
        let later = TODAY.checked_add_days(Days::new(1)).unwrap();
        let tomorrow = tracker(&storage, noon(later));
        let overview = tomorrow.overview().await?;
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].state.count, 0);
        assert_eq!(storage.item(&item.id).await?.map(|item| item.streak), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn trackers_sharing_storage_see_each_other() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        let first = tracker(&storage, noon(TODAY));
        let second = tracker(&storage, noon(TODAY));

        let item = first.create_item("Stretch", ItemKind::Habit, None).await?;
        assert!(first.toggle(&item.id, None).await?.now_completed);
        // The second toggle reads the first one's entry and retracts it, the last write wins.
        assert!(!second.toggle(&item.id, None).await?.now_completed);
        assert!(!first.status(&item.id).await?.state.completed_today);
        Ok(())
    }

    #[tokio::test]
    async fn series_split_by_kind() -> Result<()> {
        let dir = tempdir()?;
        let tracker = tracker(FileStorage::new(dir.path().to_owned())?, noon(TODAY));
        let habit = tracker.create_item("Read", ItemKind::Habit, None).await?;
        let other = tracker.create_item("Read", ItemKind::Habit, None).await?;
        let task = tracker.create_item("Call mom", ItemKind::Task, None).await?;
        assert_eq!(&*other.id, "read-2");

        tracker.toggle(&habit.id, Some(march(1))).await?;
        tracker.toggle(&other.id, Some(march(1))).await?;
        tracker.toggle(&task.id, Some(march(2))).await?;

        let habits = tracker.habit_series(2024).await?;
        let tasks = tracker.task_series(2024).await?;
        let overall = tracker.overall_series(2024).await?;
        assert_eq!(habits.count(march(1)), 2);
        assert_eq!(tasks.count(march(2)), 1);
        assert_eq!(overall.total(), 3);
        assert!(tracker.overall_series(2023).await?.is_empty());

        tracker.delete_item(&other.id).await?;
        assert_eq!(tracker.habit_series(2024).await?.count(march(1)), 1);
        // The removal already dropped its entries.
        assert_eq!(tracker.compact().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn recreated_item_starts_fresh() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        let tracker = tracker(&storage, noon(TODAY));

        let item = tracker.create_item("Read", ItemKind::Habit, None).await?;
        for day in 1..=3 {
            tracker.toggle(&item.id, Some(march(day))).await?;
        }
        tracker.delete_item(&item.id).await?;

        let again = tracker.create_item("Read", ItemKind::Habit, None).await?;
        let status = tracker.status(&again.id).await?;
        assert_eq!(status.state.count, 0);
        assert!(!status.state.completed_today);
        assert!(tracker.history(&again.id).await?.is_empty());
        assert!(tracker.habit_series(2024).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ids_left_in_the_log_are_not_reused() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStorage::new(dir.path().to_owned())?;
        storage
            .append_completion(CompletionEntity {
                item_id: "read".into(),
                at: noon(march(1)),
                completed: true,
            })
            .await?;

        let tracker = tracker(&storage, noon(TODAY));
        let item = tracker.create_item("Read", ItemKind::Habit, None).await?;
        assert_eq!(&*item.id, "read-2");
        assert_eq!(tracker.status(&item.id).await?.state.count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn focus_and_dashboard() -> Result<()> {
        let dir = tempdir()?;
        let tracker = tracker(FileStorage::new(dir.path().to_owned())?, noon(TODAY));
        assert!(tracker.log_focus(0).await.is_err());
        assert!(tracker.log_focus(25 * 60).await.is_err());

        let session = tracker.log_focus(30).await?;
        assert_eq!(session.duration_minutes, 30);
        tracker.log_focus(15).await?;

        let item = tracker.create_item("Read", ItemKind::Habit, None).await?;
        tracker.toggle(&item.id, None).await?;

        let dashboard = tracker.dashboard(2024).await?;
        assert_eq!(dashboard.today, TODAY);
        assert_eq!(dashboard.momentum.this_week_count, 2);
        assert_eq!(dashboard.momentum.last_7_days_minutes[6], 45);
        assert_eq!(dashboard.items[0].state.count, 1);
        assert_eq!(dashboard.overall.total(), 1);
        // One active day out of the 63 elapsed ones.
        assert_eq!(dashboard.consistency.to_string(), "2%");
        Ok(())
    }
}
