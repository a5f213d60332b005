use ansi_term::{Colour, Style};
use chrono::{Datelike, NaiveDate, Weekday};

use crate::engine::heatmap::{legend, GridOrder, HeatmapCell, HeatmapGrid, Intensity};

/// Filled cells are drawn in this colour, blended over [BACKGROUND] by the cell's opacity.
const ACCENT: (u8, u8, u8) = (0x10, 0xB9, 0x81);
const BACKGROUND: (u8, u8, u8) = (0x0F, 0x17, 0x2A);
const EMPTY: (u8, u8, u8) = (0x1E, 0x29, 0x3B);

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub order: GridOrder,
    /// No colours, levels are told apart by glyph.
    pub plain: bool,
    pub today: Option<NaiveDate>,
}

fn blend(opacity: f32) -> Colour {
    let mix = |accent: u8, background: u8| {
        (background as f32 + (accent as f32 - background as f32) * opacity).round() as u8
    };
    Colour::RGB(
        mix(ACCENT.0, BACKGROUND.0),
        mix(ACCENT.1, BACKGROUND.1),
        mix(ACCENT.2, BACKGROUND.2),
    )
}

fn intensity_glyph(intensity: Intensity, plain: bool) -> String {
    if plain {
        return match intensity {
            Intensity::Empty => "·",
            Intensity::Low => "░",
            Intensity::Medium => "▒",
            Intensity::High => "█",
        }
        .to_string();
    }
    let colour = match intensity {
        Intensity::Empty => Colour::RGB(EMPTY.0, EMPTY.1, EMPTY.2),
        other => blend(other.opacity()),
    };
    colour.paint("■").to_string()
}

fn cell_glyph(cell: &HeatmapCell, options: &RenderOptions) -> String {
    if !cell.in_year {
        return " ".into();
    }
    if options.today == Some(cell.date) {
        if options.plain {
            return "◆".into();
        }
        return Style::new().bold().fg(blend(1.)).paint("◆").to_string();
    }
    intensity_glyph(cell.intensity(), options.plain)
}

pub fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn month_label(month: u32) -> &'static str {
    MONTHS
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

/// Month names above the week columns they begin in. Every column is two characters wide.
fn month_header(grid: &HeatmapGrid) -> String {
    let mut header = String::new();
    for (index, week) in grid.weeks.iter().enumerate() {
        let width = index * 2;
        if header.chars().count() > width {
            continue;
        }
        let starts_month = week
            .iter()
            .find(|cell| cell.in_year && cell.date.day() == 1)
            .map(|cell| cell.date.month());
        if let Some(month) = starts_month {
            while header.chars().count() < width {
                header.push(' ');
            }
            header.push_str(month_label(month));
        }
    }
    header.trim_end().to_string()
}

pub fn render_legend(plain: bool) -> String {
    let mut line = String::from("Less ");
    for intensity in std::iter::once(Intensity::Empty).chain(legend()) {
        line.push_str(&intensity_glyph(intensity, plain));
        line.push(' ');
    }
    line.push_str("More");
    line
}

/// Draws the grid. Day-major output has one row per weekday and a month header, week-major
/// output has one row per week prefixed with the week's first day.
pub fn render_heatmap(grid: &HeatmapGrid, options: &RenderOptions) -> String {
    let mut lines = vec![];
    let cells = grid.cells(options.order);
    match options.order {
        GridOrder::DayMajor => {
            let weeks = grid.week_count().max(1);
            lines.push(format!("    {}", month_header(grid)));
            let mut weekday = grid.week_start;
            for row in cells.chunks(weeks) {
                let glyphs = row
                    .iter()
                    .map(|cell| cell_glyph(cell, options))
                    .collect::<Vec<_>>()
                    .join(" ");
                lines.push(format!("{} {glyphs}", weekday_label(weekday)));
                weekday = weekday.succ();
            }
        }
        GridOrder::WeekMajor => {
            let mut weekday = grid.week_start;
            let mut header = vec![];
            for _ in 0..7 {
                header.push(&weekday_label(weekday)[..1]);
                weekday = weekday.succ();
            }
            lines.push(format!("      {}", header.join(" ")));
            for week in cells.chunks(7) {
                let Some(first) = week.first() else {
                    continue;
                };
                let glyphs = week
                    .iter()
                    .map(|cell| cell_glyph(cell, options))
                    .collect::<Vec<_>>()
                    .join(" ");
                lines.push(format!("{} {glyphs}", first.date.format("%m-%d")));
            }
        }
    }
    lines.push(String::new());
    lines.push(render_legend(options.plain));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Weekday};

    use super::{blend, render_heatmap, render_legend, RenderOptions};
    use crate::engine::{
        heatmap::{build_year_grid, GridOrder},
        series::DaySeries,
    };

    #[test]
    fn blending_spans_background_to_accent() {
        assert_eq!(blend(0.), ansi_term::Colour::RGB(0x0F, 0x17, 0x2A));
        assert_eq!(blend(1.), ansi_term::Colour::RGB(0x10, 0xB9, 0x81));
    }

    #[test]
    fn plain_day_major_layout() {
        let series =
            DaySeries::from_entries([("2024-01-01", 1), ("2024-01-02", 3), ("2024-01-03", 9)]);
        let grid = build_year_grid(&series, 2024, Weekday::Sun);
        let output = render_heatmap(
            &grid,
            &RenderOptions {
                order: GridOrder::DayMajor,
                plain: true,
                today: None,
            },
        );
        let lines = output.lines().collect::<Vec<_>>();
        // Header, seven weekday rows, a blank line and the legend.
        assert_eq!(lines.len(), 10);
        assert!(lines[0].trim_start().starts_with("Jan"));
        assert!(lines[0].contains("Dec"));
        assert!(lines[1].starts_with("Sun"));
        assert!(lines[2].starts_with("Mon ░"));
        assert!(lines[3].starts_with("Tue ▒"));
        assert!(lines[4].starts_with("Wed █"));
        assert_eq!(lines[9], render_legend(true));
    }

    #[test]
    fn week_major_marks_today() {
        let grid = build_year_grid(&DaySeries::new(), 2024, Weekday::Mon);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let output = render_heatmap(
            &grid,
            &RenderOptions {
                order: GridOrder::WeekMajor,
                plain: true,
                today: Some(today),
            },
        );
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0].trim(), "M T W T F S S");
        assert_eq!(lines[1], "01-01 ◆ · · · · · ·");
        assert_eq!(lines.len(), 1 + grid.week_count() + 2);
    }
}
