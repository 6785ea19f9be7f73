use clap::Subcommand;
use serde::Serialize;

use accountable_core::{ClusterProgress, Config, OverallProgress, StreakReport, ToggleOutcome};

use super::{open_store, resolve_date, CliResult, CliStore};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Completed habits and cluster progress for a day
    Show {
        /// Day to show (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Flip a habit for a day
    Toggle {
        /// Habit id (see `cluster list`)
        habit_id: String,
        /// Day to change (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Set a habit to done or not done
    Set {
        /// Habit id (see `cluster list`)
        habit_id: String,
        /// true or false
        #[arg(action = clap::ArgAction::Set)]
        completed: bool,
        /// Day to change (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Serialize)]
struct DayView {
    date: String,
    editable: bool,
    completed: Vec<String>,
    clusters: Vec<ClusterView>,
    overall: OverallProgress,
}

#[derive(Serialize)]
struct ClusterView {
    id: String,
    #[serde(flatten)]
    progress: ClusterProgress,
    complete: bool,
}

fn day_view(store: &CliStore) -> DayView {
    let date = store.current_date().unwrap_or_else(|| store.today());
    DayView {
        date: date.to_string(),
        editable: store.is_date_editable(date),
        completed: store.completed_habits().iter().cloned().collect(),
        clusters: store
            .cluster_progress()
            .into_iter()
            .map(|(id, progress)| ClusterView {
                id,
                complete: progress.is_complete(),
                progress,
            })
            .collect(),
        overall: store.overall_progress(),
    }
}

fn ensure_known_habit(config: &Config, habit_id: &str) -> CliResult {
    match config.cluster_for_habit(habit_id) {
        Some(_) => Ok(()),
        None => Err(format!("unknown habit: {habit_id}").into()),
    }
}

fn print_outcome(
    outcome: &ToggleOutcome,
    store: &CliStore,
    streak: Option<StreakReport>,
) -> CliResult {
    let json = serde_json::json!({
        "habit_id": outcome.habit_id,
        "date": outcome.date.to_string(),
        "completed": outcome.completed,
        "day": day_view(store),
        "streak": streak,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

pub fn run(action: HabitAction) -> CliResult {
    let (config, mut store) = open_store()?;

    match action {
        HabitAction::Show { date } => {
            let date = resolve_date(&store, date.as_deref())?;
            store.load_date(date)?;
            println!("{}", serde_json::to_string_pretty(&day_view(&store))?);
        }
        HabitAction::Toggle { habit_id, date } => {
            ensure_known_habit(&config, &habit_id)?;
            let date = resolve_date(&store, date.as_deref())?;
            store.load_date(date)?;
            let outcome = store.toggle_habit(&habit_id)?;
            // One-shot process: settle the debounced refresh before exiting.
            let streak = store.flush_streak_refresh()?;
            print_outcome(&outcome, &store, streak)?;
        }
        HabitAction::Set {
            habit_id,
            completed,
            date,
        } => {
            ensure_known_habit(&config, &habit_id)?;
            let date = resolve_date(&store, date.as_deref())?;
            store.load_date(date)?;
            let outcome = store.set_habit(&habit_id, completed)?;
            let streak = store.flush_streak_refresh()?;
            print_outcome(&outcome, &store, streak)?;
        }
    }
    Ok(())
}
