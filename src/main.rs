use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    shortshelf::logging::init(shortshelf::logging::CLI_DIRECTIVES).context("init logging")?;

    let cli = shortshelf::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        shortshelf::cli::Command::Parse(args) => {
            shortshelf::commands::parse(args).context("parse")?;
        }
        shortshelf::cli::Command::Fetch(args) => {
            shortshelf::commands::fetch(args).await.context("fetch")?;
        }
        shortshelf::cli::Command::List(args) => {
            shortshelf::commands::list(args).await.context("list")?;
        }
        shortshelf::cli::Command::Favorite {
            command: shortshelf::cli::FavoriteCommand::Toggle(args),
        } => {
            shortshelf::commands::favorite_toggle(args).await.context("favorite toggle")?;
        }
        shortshelf::cli::Command::Favorite {
            command: shortshelf::cli::FavoriteCommand::List(args),
        } => {
            shortshelf::commands::favorite_list(args).await.context("favorite list")?;
        }
    }

    Ok(())
}
