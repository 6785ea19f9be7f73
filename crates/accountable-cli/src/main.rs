use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "accountable", version, about = "Accountable habit tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark, unmark and inspect habits for a day
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Overall and per-cluster streaks
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Raw stored logs
    Log {
        #[command(subcommand)]
        action: commands::log::LogAction,
    },
    /// Month or week completion summary
    Calendar(commands::calendar::CalendarArgs),
    /// Configured clusters
    Cluster {
        #[command(subcommand)]
        action: commands::cluster::ClusterAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ACCOUNTABLE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Streak { action } => commands::streak::run(action),
        Commands::Log { action } => commands::log::run(action),
        Commands::Calendar(args) => commands::calendar::run(args),
        Commands::Cluster { action } => commands::cluster::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
