use clap::Subcommand;

use accountable_core::Config;

use super::CliResult;

#[derive(Subcommand)]
pub enum ClusterAction {
    /// List configured clusters and their habits
    List,
}

pub fn run(action: ClusterAction) -> CliResult {
    let config = Config::load()?;

    match action {
        ClusterAction::List => {
            println!("{}", serde_json::to_string_pretty(&config.clusters)?);
        }
    }
    Ok(())
}
