use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a local CSV file and print its records as JSON lines.
    Parse(ParseArgs),
    /// Fetch the remote sheet and print its records as JSON lines.
    Fetch(FetchArgs),
    /// Print the records that pass the given filters.
    List(ListArgs),
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommand,
    },
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Sheet URL (defaults to $SHORTSHELF_SHEET_URL, then the built-in sheet).
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Local CSV file; the remote sheet is fetched when omitted.
    #[arg(long, conflicts_with = "url")]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub url: Option<String>,

    /// Case-insensitive search over title, tags and category.
    #[arg(long, default_value = "")]
    pub query: String,

    /// Active category filter (repeatable; any match passes).
    #[arg(long = "category")]
    pub categories: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub favorites_only: bool,

    /// Directory holding persisted favorites.
    #[arg(long, default_value = ".shortshelf")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum FavoriteCommand {
    /// Add the id if absent, remove it if present.
    Toggle(FavoriteToggleArgs),
    List(FavoriteListArgs),
}

#[derive(Debug, Args)]
pub struct FavoriteToggleArgs {
    #[arg(long)]
    pub id: String,

    #[arg(long, default_value = ".shortshelf")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct FavoriteListArgs {
    #[arg(long, default_value = ".shortshelf")]
    pub data_dir: PathBuf,
}
