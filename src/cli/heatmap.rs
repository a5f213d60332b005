use std::fmt::Display;

use anyhow::Result;
use chrono::Datelike;
use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::{
    engine::heatmap::{build_year_grid, legend, GridOrder, HeatmapGrid, Intensity},
    storage::tracker_storage::TrackerStorage,
    tracker::Tracker,
    utils::time::days_in_year,
};

use super::output::{
    print_json,
    render::{render_heatmap, RenderOptions},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Source {
    Habits,
    Tasks,
    Overall,
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Habits => write!(f, "habits"),
            Source::Tasks => write!(f, "tasks"),
            Source::Overall => write!(f, "overall"),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Order {
    /// One row per weekday
    Day,
    /// One row per week
    Week,
}

impl From<Order> for GridOrder {
    fn from(value: Order) -> Self {
        match value {
            Order::Day => GridOrder::DayMajor,
            Order::Week => GridOrder::WeekMajor,
        }
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Day => write!(f, "day"),
            Order::Week => write!(f, "week"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HeatmapCommand {
    #[arg(long, help = "Year to display. Defaults to the current one")]
    year: Option<i32>,
    #[arg(long, default_value_t = Source::Overall, help = "Which items contribute to the counts")]
    source: Source,
    #[arg(
        long,
        default_value_t = Order::Day,
        help = "Lay the grid out by weekday rows or by week rows"
    )]
    order: Order,
    #[arg(long, help = "Disable colours")]
    plain: bool,
    #[arg(long, help = "Print the grid and its legend as json instead of drawing it")]
    json: bool,
}

#[derive(Serialize)]
struct HeatmapJson<'a> {
    #[serde(flatten)]
    grid: &'a HeatmapGrid,
    legend: [Intensity; 3],
    total: u32,
    max_count: u32,
}

/// Command to process `heatmap`. Prints a year of completions as a GitHub style contribution
/// grid.
pub async fn process_heatmap_command(
    tracker: &Tracker<impl TrackerStorage>,
    HeatmapCommand {
        year,
        source,
        order,
        plain,
        json,
    }: HeatmapCommand,
) -> Result<()> {
    let today = tracker.today();
    let year = year.unwrap_or(today.year());

    let series = match source {
        Source::Habits => tracker.habit_series(year).await?,
        Source::Tasks => tracker.task_series(year).await?,
        Source::Overall => tracker.overall_series(year).await?,
    };

    let grid = build_year_grid(&series, year, tracker.week_start());
    if json {
        return print_json(&HeatmapJson {
            grid: &grid,
            legend: legend(),
            total: grid.total(),
            max_count: grid.max_count(),
        });
    }

    let options = RenderOptions {
        order: order.into(),
        plain,
        today: (today.year() == year).then_some(today),
    };
    println!("{}", render_heatmap(&grid, &options));
    println!();
    println!(
        "{} {source} completions in {year}, active on {} of {} days, {} consistency, busiest day {}",
        grid.total(),
        series.len(),
        days_in_year(year),
        series.consistency(year, today),
        grid.max_count()
    );
    Ok(())
}
