pub mod dashboard;
pub mod focus;
pub mod heatmap;
pub mod items;
pub mod output;

use std::{fmt::Display, path::PathBuf};

use anyhow::Result;
use chrono::Weekday;
use clap::{Parser, Subcommand, ValueEnum};
use dashboard::process_dashboard_command;
use focus::{process_focus_command, FocusCommand};
use heatmap::{process_heatmap_command, HeatmapCommand};
use items::{
    process_add_command, process_list_command, process_remove_command, process_stats_command,
    process_toggle_command, AddCommand, ToggleCommand,
};
use tracing::{debug, level_filters::LevelFilter};

use crate::{
    engine::day::DayBoundary,
    storage::tracker_storage::FileStorage,
    tracker::Tracker,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WeekStart {
    Sun,
    Mon,
}

impl From<WeekStart> for Weekday {
    fn from(value: WeekStart) -> Self {
        match value {
            WeekStart::Sun => Weekday::Sun,
            WeekStart::Mon => Weekday::Mon,
        }
    }
}

impl Display for WeekStart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeekStart::Sun => write!(f, "sun"),
            WeekStart::Mon => write!(f, "mon"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "habitgrid", version, long_about = None)]
#[command(about = "Track habits and tasks, see them as a yearly heatmap", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = DayBoundary::Local,
        help = "Timezone that decides where one day ends and the next begins: local, utc or an offset such as +02:00. Keep it the same between runs"
    )]
    boundary: DayBoundary,
    #[arg(long, global = true, default_value_t = WeekStart::Sun, help = "First day of the week")]
    week_start: WeekStart,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start tracking a habit or a task")]
    Add {
        #[command(flatten)]
        command: AddCommand,
    },
    #[command(about = "Stop tracking an item and drop its history")]
    Remove { id: String },
    #[command(about = "Mark an item as done, or undo it")]
    Toggle {
        #[command(flatten)]
        command: ToggleCommand,
    },
    #[command(about = "List items with their current streaks")]
    List {
        #[arg(long, help = "Print as json")]
        json: bool,
    },
    #[command(about = "Streak statistics of a single item")]
    Stats {
        id: String,
        #[arg(long, help = "Print as json")]
        json: bool,
    },
    #[command(about = "Display a year of completions as a heatmap")]
    Heatmap {
        #[command(flatten)]
        command: HeatmapCommand,
    },
    #[command(about = "Focus sessions")]
    Focus {
        #[command(subcommand)]
        command: FocusCommand,
    },
    #[command(about = "Today's items, the heatmap and focus momentum in one view")]
    Dashboard {
        #[arg(long, help = "Print as json")]
        json: bool,
        #[arg(long, help = "Disable colours")]
        plain: bool,
    },
    #[command(about = "Rewrite the completion log keeping only entries still in effect")]
    Compact {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;
    debug!("Using {dir:?} with day boundary {}", args.boundary);

    let tracker = Tracker::new(
        FileStorage::new(dir)?,
        Box::new(DefaultClock),
        args.boundary,
        args.week_start.into(),
    );

    match args.commands {
        Commands::Add { command } => process_add_command(&tracker, command).await,
        Commands::Remove { id } => process_remove_command(&tracker, id).await,
        Commands::Toggle { command } => process_toggle_command(&tracker, command).await,
        Commands::List { json } => process_list_command(&tracker, json).await,
        Commands::Stats { id, json } => process_stats_command(&tracker, id, json).await,
        Commands::Heatmap { command } => process_heatmap_command(&tracker, command).await,
        Commands::Focus { command } => process_focus_command(&tracker, command).await,
        Commands::Dashboard { json, plain } => {
            process_dashboard_command(&tracker, json, plain).await
        }
        Commands::Compact {} => {
            let dropped = tracker.compact().await?;
            println!("Dropped {dropped} superseded entries");
            Ok(())
        }
    }
}
