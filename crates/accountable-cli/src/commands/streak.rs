use clap::Subcommand;

use super::{open_store, CliResult};

#[derive(Subcommand)]
pub enum StreakAction {
    /// Overall streak, tier and per-cluster streaks as of today
    Show,
    /// Overall streak only, as a bare number
    Count,
}

pub fn run(action: StreakAction) -> CliResult {
    let (_config, store) = open_store()?;

    match action {
        StreakAction::Show => {
            let report = store.streak_report()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        StreakAction::Count => {
            println!("{}", store.calculate_streak()?);
        }
    }
    Ok(())
}
