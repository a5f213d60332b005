use anyhow::Result;
use chrono::Datelike;

use crate::{
    engine::heatmap::{build_year_grid, GridOrder},
    storage::tracker_storage::TrackerStorage,
    tracker::Tracker,
};

use super::output::{
    format_minutes, format_signed, print_json,
    render::{render_heatmap, RenderOptions},
};

/// Everything at once: today's items, the overall heatmap and focus momentum.
pub async fn process_dashboard_command(
    tracker: &Tracker<impl TrackerStorage>,
    json: bool,
    plain: bool,
) -> Result<()> {
    let year = tracker.today().year();
    let dashboard = tracker.dashboard(year).await?;
    if json {
        return print_json(&dashboard);
    }

    let done = dashboard
        .items
        .iter()
        .filter(|status| status.state.completed_today)
        .count();
    println!("{} · {done}/{} done today", dashboard.today, dashboard.items.len());
    for status in &dashboard.items {
        let mark = if status.state.completed_today { "x" } else { " " };
        println!(
            "  [{mark}] {} ({} day streak)",
            status.item.title, status.state.count
        );
    }
    println!();

    let grid = build_year_grid(&dashboard.overall, year, tracker.week_start());
    println!(
        "{}",
        render_heatmap(
            &grid,
            &RenderOptions {
                order: GridOrder::DayMajor,
                plain,
                today: Some(dashboard.today),
            },
        )
    );
    println!(
        "Habits {} · Tasks {} · Consistency {}",
        dashboard.habits.total(),
        dashboard.tasks.total(),
        dashboard.consistency
    );
    println!();

    let momentum = &dashboard.momentum;
    println!(
        "Focus: {} sessions this week ({} vs last week), {} in the last 7 days",
        momentum.this_week_count,
        format_signed(momentum.difference()),
        format_minutes(momentum.total_minutes())
    );
    Ok(())
}
