use chrono::Local;
use clap::Subcommand;
use nodoff_core::timer::AutoArmScheduler;
use nodoff_core::{Config, DailyWindow, TimeOfDay};
use serde_json::json;

#[derive(Subcommand)]
pub enum AutoAction {
    /// Check whether a time of day falls inside a window
    Check {
        /// Window start, HH:MM
        #[arg(long)]
        start: TimeOfDay,
        /// Window end (exclusive), HH:MM
        #[arg(long)]
        end: TimeOfDay,
        /// Time to check, HH:MM; defaults to now
        #[arg(long)]
        at: Option<TimeOfDay>,
    },
    /// Show what the configured auto timer would do right now
    Status,
}

pub fn run(action: AutoAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AutoAction::Check { start, end, at } => {
            let window = DailyWindow::new(start, end);
            let at = at.unwrap_or_else(|| TimeOfDay::of(&Local::now().naive_local()));
            let output = json!({
                "start": start,
                "end": end,
                "at": at,
                "wraps_midnight": window.wraps_midnight(),
                "inside": window.contains(at.minutes()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        AutoAction::Status => {
            let config = Config::load()?;
            let scheduler = AutoArmScheduler::new(config.auto_timer.mode, config.auto_window());
            let now = Local::now().naive_local();
            let output = json!({
                "mode": config.auto_timer.mode,
                "start": scheduler.window.start,
                "end": scheduler.window.end,
                "inside": scheduler.is_within_window(&now),
                "would_arm": scheduler.decide(&now),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}
