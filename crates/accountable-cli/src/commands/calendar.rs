use clap::Args;

use accountable_core::habit::log::parse_month;

use super::{open_store, resolve_date, CliResult};

#[derive(Args)]
pub struct CalendarArgs {
    /// Month to summarize (YYYY-MM, default current month)
    #[arg(long, conflicts_with_all = ["week", "date"])]
    month: Option<String>,
    /// Summarize the week instead of the month
    #[arg(long)]
    week: bool,
    /// Any day inside the week to summarize (YYYY-MM-DD, default today)
    #[arg(long, requires = "week")]
    date: Option<String>,
    /// Print the stored logs for the period instead of per-day summaries
    #[arg(long)]
    logs: bool,
}

pub fn run(args: CalendarArgs) -> CliResult {
    let (_config, store) = open_store()?;

    let output = if args.week {
        let date = resolve_date(&store, args.date.as_deref())?;
        if args.logs {
            serde_json::to_value(store.week_logs(date)?)?
        } else {
            serde_json::to_value(store.week_summary(date)?)?
        }
    } else {
        let anchor = match args.month.as_deref() {
            Some(month) => parse_month(month)?.0,
            None => store.today(),
        };
        if args.logs {
            serde_json::to_value(store.month_logs(anchor)?)?
        } else {
            serde_json::to_value(store.month_summary(anchor)?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
