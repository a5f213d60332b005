use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::utils::time::{week_start_of, year_bounds};

use super::series::DaySeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Empty,
    Low,
    Medium,
    High,
}

impl Intensity {
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => Intensity::Empty,
            1 => Intensity::Low,
            2..=4 => Intensity::Medium,
            _ => Intensity::High,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Intensity::Empty => 0,
            Intensity::Low => 1,
            Intensity::Medium => 2,
            Intensity::High => 3,
        }
    }

    pub fn opacity(self) -> f32 {
        match self {
            Intensity::Empty => 0.,
            Intensity::Low => 0.2,
            Intensity::Medium => 0.5,
            Intensity::High => 1.,
        }
    }
}

/// Levels shown in the "Less … More" scale, lowest first.
pub fn legend() -> [Intensity; 3] {
    [Intensity::Low, Intensity::Medium, Intensity::High]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    pub count: u32,
    /// False for the cells padding the first and last week.
    pub in_year: bool,
}

impl HeatmapCell {
    pub fn intensity(&self) -> Intensity {
        Intensity::from_count(self.count)
    }
}

/// `{ "date": "2024-03-01", "count": 3, "intensity": "medium", "in_year": true }`
impl Serialize for HeatmapCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut cell = serializer.serialize_struct("HeatmapCell", 4)?;
        cell.serialize_field("date", &self.date)?;
        cell.serialize_field("count", &self.count)?;
        cell.serialize_field("intensity", &self.intensity())?;
        cell.serialize_field("in_year", &self.in_year)?;
        cell.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridOrder {
    /// Every first weekday of the year, then every second weekday and so on.
    #[default]
    DayMajor,
    /// One full week after another.
    WeekMajor,
}

/// A year laid out as week columns of seven days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapGrid {
    pub year: i32,
    pub week_start: Weekday,
    pub weeks: Vec<[HeatmapCell; 7]>,
}

impl HeatmapGrid {
    pub fn week_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn cells(&self, order: GridOrder) -> Vec<HeatmapCell> {
        match order {
            GridOrder::WeekMajor => self.weeks.iter().flatten().copied().collect(),
            GridOrder::DayMajor => (0..7).flat_map(|weekday| self.row(weekday)).collect(),
        }
    }

    /// Cells of the `weekday`-th day of every week, counted from the week start.
    pub fn row(&self, weekday: usize) -> Vec<HeatmapCell> {
        self.weeks
            .iter()
            .filter_map(|week| week.get(weekday).copied())
            .collect()
    }

    /// `(week, weekday)` of the cell holding `date`.
    pub fn position_of(&self, date: NaiveDate) -> Option<(usize, usize)> {
        let first = self.weeks.first()?[0].date;
        if date < first {
            return None;
        }
        let offset = (date - first).num_days() as usize;
        let position = (offset / 7, offset % 7);
        (position.0 < self.weeks.len()).then_some(position)
    }

    pub fn total(&self) -> u32 {
        self.weeks
            .iter()
            .flatten()
            .fold(0, |sum, cell| sum.saturating_add(cell.count))
    }

    pub fn max_count(&self) -> u32 {
        self.weeks
            .iter()
            .flatten()
            .map(|cell| cell.count)
            .max()
            .unwrap_or(0)
    }
}

/// Lays `series` out over `year`, from the week holding January 1st to the week holding
/// December 31st. Days of other years become zero placeholders.
pub fn build_year_grid(series: &DaySeries, year: i32, week_start: Weekday) -> HeatmapGrid {
    let mut grid = HeatmapGrid {
        year,
        week_start,
        weeks: vec![],
    };
    let Some((first, last)) = year_bounds(year) else {
        return grid;
    };

    let mut week = week_start_of(first, week_start);
    while week <= last {
        let mut cells = [HeatmapCell {
            date: week,
            count: 0,
            in_year: false,
        }; 7];
        for (offset, cell) in cells.iter_mut().enumerate() {
            let Some(date) = week.checked_add_days(Days::new(offset as u64)) else {
                return grid;
            };
            let in_year = date.year() == year;
            *cell = HeatmapCell {
                date,
                count: if in_year { series.count(date) } else { 0 },
                in_year,
            };
        }
        grid.weeks.push(cells);

        week = match week.checked_add_days(Days::new(7)) {
            Some(next) => next,
            None => break,
        };
    }
    grid
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, Weekday};

    use super::{build_year_grid, legend, GridOrder, Intensity};
    use crate::engine::series::DaySeries;

    #[test]
    fn intensity_levels() {
        let levels = [0, 1, 2, 4, 5, 10].map(|count| Intensity::from_count(count).level());
        assert_eq!(levels, [0, 1, 2, 2, 3, 3]);
        assert_eq!(Intensity::from_count(3).opacity(), 0.5);
        assert!(legend().windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn every_day_of_the_year_is_covered_once() {
        for (year, days) in [(2023, 365), (2024, 366)] {
            for week_start in [Weekday::Sun, Weekday::Mon] {
                let grid = build_year_grid(&DaySeries::new(), year, week_start);
                let cells = grid.cells(GridOrder::WeekMajor);
                assert_eq!(cells.iter().filter(|cell| cell.in_year).count(), days);
                assert!(cells.iter().all(|cell| cell.count == 0));
                assert!(grid
                    .weeks
                    .iter()
                    .all(|week| week[0].date.weekday() == week_start));
            }
        }
    }

    #[test]
    fn placeholders_stay_empty() {
        // Both sides of the year boundary hold data, only the in-year days show up.
        let series =
            DaySeries::from_entries([("2023-12-31", 7), ("2024-01-01", 2), ("2025-01-01", 1)]);
        let grid = build_year_grid(&series, 2024, Weekday::Sun);
        let cells = grid.cells(GridOrder::WeekMajor);
        assert!(cells
            .iter()
            .filter(|cell| !cell.in_year)
            .all(|cell| cell.count == 0));
        assert_eq!(grid.total(), 2);
        assert_eq!(grid.max_count(), 2);
    }

    #[test]
    fn cells_serialize_with_their_intensity() {
        let series = DaySeries::from_entries([("2024-03-01", 3)]);
        let grid = build_year_grid(&series, 2024, Weekday::Sun);
        let march_first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let (week, weekday) = grid.position_of(march_first).unwrap();

        let json = serde_json::to_value(grid).unwrap();
        assert_eq!(json["week_start"], "Sun");
        assert_eq!(
            json["weeks"][week][weekday],
            serde_json::json!({
                "date": "2024-03-01",
                "count": 3,
                "intensity": "medium",
                "in_year": true,
            })
        );
        assert_eq!(json["weeks"][0][0]["intensity"], "empty");
    }

    #[test]
    fn some_leap_years_need_54_weeks() {
        assert_eq!(build_year_grid(&DaySeries::new(), 2000, Weekday::Sun).week_count(), 54);
        assert_eq!(build_year_grid(&DaySeries::new(), 2028, Weekday::Sun).week_count(), 54);
        assert_eq!(build_year_grid(&DaySeries::new(), 2024, Weekday::Sun).week_count(), 53);
        assert!(build_year_grid(&DaySeries::new(), i32::MAX, Weekday::Sun)
            .weeks
            .is_empty());
    }

    #[test]
    fn day_major_walks_rows_first() {
        let grid = build_year_grid(&DaySeries::new(), 2024, Weekday::Sun);
        let cells = grid.cells(GridOrder::DayMajor);
        let weeks = grid.week_count();
        assert_eq!(cells.len(), weeks * 7);
        assert!(cells[..weeks]
            .iter()
            .all(|cell| cell.date.weekday() == Weekday::Sun));
        assert_eq!(cells[weeks].date.weekday(), Weekday::Mon);

        let march_first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let (week, weekday) = grid.position_of(march_first).unwrap();
        assert_eq!(grid.weeks[week][weekday].date, march_first);
        assert_eq!(weekday, 5);
    }
}
