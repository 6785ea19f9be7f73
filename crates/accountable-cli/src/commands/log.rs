use clap::Subcommand;

use accountable_core::habit::log::parse_date_key;
use accountable_core::HabitRepository;

use super::{open_store, CliResult};

#[derive(Subcommand)]
pub enum LogAction {
    /// Stored log for one day (null if none)
    Get {
        /// YYYY-MM-DD
        date: String,
    },
    /// Stored logs in an inclusive date range
    Range {
        /// First day (YYYY-MM-DD)
        start: String,
        /// Last day (YYYY-MM-DD)
        end: String,
    },
}

pub fn run(action: LogAction) -> CliResult {
    let (_config, store) = open_store()?;
    let repo = store.repository();

    match action {
        LogAction::Get { date } => {
            let log = repo.get_log(parse_date_key(&date)?)?;
            println!("{}", serde_json::to_string_pretty(&log)?);
        }
        LogAction::Range { start, end } => {
            let logs = repo.get_date_range(parse_date_key(&start)?, parse_date_key(&end)?)?;
            println!("{}", serde_json::to_string_pretty(&logs)?);
        }
    }
    Ok(())
}
