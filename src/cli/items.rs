use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    engine::day::DayBoundary,
    storage::{entities::ItemKind, tracker_storage::TrackerStorage},
    tracker::Tracker,
};

use super::{
    output::{format_signed, print_json},
    Args,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct AddCommand {
    #[arg(help = "Title of the item. The id is derived from it")]
    title: String,
    #[arg(long, help = "Create a one-off task instead of a daily habit")]
    task: bool,
    #[arg(long, help = "Optional category shown next to the title")]
    category: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ToggleCommand {
    #[arg(help = "Id of the item, as shown by `list`")]
    id: String,
    #[arg(
        long,
        short,
        help = "Day to toggle. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

pub async fn process_add_command(
    tracker: &Tracker<impl TrackerStorage>,
    AddCommand {
        title,
        task,
        category,
    }: AddCommand,
) -> Result<()> {
    let kind = if task { ItemKind::Task } else { ItemKind::Habit };
    let item = tracker.create_item(&title, kind, category).await?;
    println!("Added {} {}", item.kind, item.id);
    Ok(())
}

pub async fn process_remove_command(
    tracker: &Tracker<impl TrackerStorage>,
    id: String,
) -> Result<()> {
    tracker.delete_item(&id).await?;
    println!("Removed {id}");
    Ok(())
}

pub async fn process_toggle_command(
    tracker: &Tracker<impl TrackerStorage>,
    ToggleCommand {
        id,
        date,
        date_style,
    }: ToggleCommand,
) -> Result<()> {
    let day = match date {
        Some(date) => Some(
            parse_day(&date, tracker.boundary(), tracker.now(), date_style).map_err(|e| {
                Args::command().error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate date {e}"),
                )
            })?,
        ),
        None => None,
    };

    let result = tracker.toggle(&id, day).await?;
    let state = if result.now_completed { "done" } else { "not done" };
    println!(
        "{id} is {state} on {}. Streak {} ({})",
        result.day,
        result.streak,
        format_signed(result.streak_delta as i64)
    );
    Ok(())
}

pub async fn process_list_command(
    tracker: &Tracker<impl TrackerStorage>,
    json: bool,
) -> Result<()> {
    let statuses = tracker.overview().await?;
    if json {
        return print_json(&statuses);
    }
    if statuses.is_empty() {
        println!("Nothing tracked yet. Add something with `habitgrid add <title>`");
        return Ok(());
    }
    for status in statuses {
        let done = if status.state.completed_today { "x" } else { " " };
        let category = status
            .item
            .category
            .as_deref()
            .map(|category| format!(" [{category}]"))
            .unwrap_or_default();
        println!(
            "[{done}] {}\t{}\t{}\t{}{category}",
            status.item.id, status.item.kind, status.state.count, status.item.title
        );
    }
    Ok(())
}

pub async fn process_stats_command(
    tracker: &Tracker<impl TrackerStorage>,
    id: String,
    json: bool,
) -> Result<()> {
    let summary = tracker.summary(&id).await?;
    if json {
        return print_json(&summary);
    }
    println!("Current streak\t{}", summary.current);
    println!("Longest streak\t{}", summary.longest);
    println!("Days completed\t{}", summary.total_days);
    match summary.last_completed {
        Some(day) => println!("Last completed\t{day}"),
        None => println!("Last completed\tnever"),
    }
    Ok(())
}

/// Resolves a human readable date in the timezone of `boundary`, so "yesterday" means the
/// day before the one the tracker considers today.
pub fn parse_day(
    input: &str,
    boundary: DayBoundary,
    now: DateTime<Utc>,
    style: DateStyle,
) -> Result<NaiveDate> {
    fn parse_in<Tz: TimeZone>(
        input: &str,
        now: DateTime<Tz>,
        style: DateStyle,
    ) -> Result<NaiveDate>
    where
        Tz::Offset: Copy,
    {
        parse_date_string(input, now, style.into())
            .map(|date| date.date_naive())
            .map_err(|e| anyhow::anyhow!("{input:?}: {e}"))
    }

    match boundary {
        DayBoundary::Local => parse_in(input, now.with_timezone(&Local), style),
        DayBoundary::Utc => parse_in(input, now, style),
        DayBoundary::Fixed(offset) => parse_in(input, now.with_timezone(&offset), style),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{parse_day, DateStyle};
    use crate::engine::day::DayBoundary;

    #[test]
    fn dates_follow_style_and_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 3, 23, 30, 0).unwrap();
        assert_eq!(
            parse_day("15/03/2024", DayBoundary::Utc, now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert_eq!(
            parse_day("03/15/2024", DayBoundary::Utc, now, DateStyle::Us).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert_eq!(
            parse_day("yesterday", DayBoundary::Utc, now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
        // Two hours east it's already the 4th.
        assert_eq!(
            parse_day("yesterday", "+02:00".parse().unwrap(), now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
        assert!(parse_day("someday", DayBoundary::Utc, now, DateStyle::Uk).is_err());
    }
}
