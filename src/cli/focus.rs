use anyhow::Result;
use clap::Subcommand;

use crate::{storage::tracker_storage::TrackerStorage, tracker::Tracker};

use super::output::{format_minutes, format_signed, print_json};

#[derive(Subcommand, Debug)]
pub enum FocusCommand {
    #[command(about = "Record a focus session that just ended")]
    Log {
        #[arg(help = "Length of the session in minutes")]
        minutes: u32,
    },
    #[command(about = "Compare this week's focus sessions with the previous week")]
    Momentum {
        #[arg(long, help = "Print as json")]
        json: bool,
    },
}

pub async fn process_focus_command(
    tracker: &Tracker<impl TrackerStorage>,
    command: FocusCommand,
) -> Result<()> {
    match command {
        FocusCommand::Log { minutes } => {
            let session = tracker.log_focus(minutes).await?;
            println!("Logged {} of focus", format_minutes(session.duration_minutes));
        }
        FocusCommand::Momentum { json } => {
            let momentum = tracker.focus_momentum().await?;
            if json {
                return print_json(&momentum);
            }
            println!(
                "This week {} sessions, last week {} ({})",
                momentum.this_week_count,
                momentum.last_week_count,
                format_signed(momentum.difference())
            );
            for (day, minutes) in momentum.last_7_days.iter().zip(momentum.last_7_days_minutes) {
                println!("{}\t{}", day.format("%a %d"), format_minutes(minutes));
            }
            println!("Total\t{}", format_minutes(momentum.total_minutes()));
        }
    }
    Ok(())
}
