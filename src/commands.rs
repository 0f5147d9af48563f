use std::io::Write as _;

use anyhow::Context as _;

use crate::catalog::{FilterState, filter_records};
use crate::cli::{FavoriteListArgs, FavoriteToggleArgs, FetchArgs, ListArgs, ParseArgs};
use crate::favorites::{FavoriteSet, FileKeyValueStore};
use crate::records::{self, Record};
use crate::sheet::SheetClient;

pub fn parse(args: ParseArgs) -> anyhow::Result<()> {
    let records = read_local(&args.input)?;
    tracing::debug!(count = records.len(), input = %args.input.display(), "parsed records");
    write_json_lines(records.iter())
}

pub async fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let records = fetch_remote(args.url.as_deref()).await?;
    write_json_lines(records.iter())
}

pub async fn list(args: ListArgs) -> anyhow::Result<()> {
    let records = match &args.input {
        Some(input) => read_local(input)?,
        None => fetch_remote(args.url.as_deref()).await?,
    };

    let storage = FileKeyValueStore::new(&args.data_dir);
    let favorites = FavoriteSet::load(&storage).await;
    let filter = FilterState {
        query: args.query,
        active_categories: args.categories,
        favorites_only: args.favorites_only,
    };

    write_json_lines(filter_records(&records, &filter, &favorites).into_iter())
}

pub async fn favorite_toggle(args: FavoriteToggleArgs) -> anyhow::Result<()> {
    let id = args.id.trim();
    if id.is_empty() {
        anyhow::bail!("--id must not be empty");
    }
    let storage = FileKeyValueStore::new(&args.data_dir);
    let mut favorites = FavoriteSet::load(&storage).await;
    let favorite = favorites.toggle(id);
    favorites.save(&storage).await;
    println!("{}", if favorite { "added" } else { "removed" });
    Ok(())
}

pub async fn favorite_list(args: FavoriteListArgs) -> anyhow::Result<()> {
    let favorites = FavoriteSet::load(&FileKeyValueStore::new(&args.data_dir)).await;
    let mut out = std::io::stdout().lock();
    for id in favorites.iter() {
        writeln!(out, "{id}").context("write favorite id")?;
    }
    Ok(())
}

fn read_local(path: &std::path::Path) -> anyhow::Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read table: {}", path.display()))?;
    Ok(records::parse_records(&text))
}

async fn fetch_remote(url: Option<&str>) -> anyhow::Result<Vec<Record>> {
    let url = match url {
        Some(raw) => crate::config::parse_sheet_url(raw).context("parse --url")?,
        None => crate::config::sheet_url_from_env()?,
    };
    SheetClient::new(url)
        .fetch_records()
        .await
        .context("Couldn't load CSV")
}

fn write_json_lines<'a>(records: impl Iterator<Item = &'a Record>) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    for record in records {
        serde_json::to_writer(&mut out, record).context("serialize record")?;
        out.write_all(b"\n").context("write record newline")?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}
