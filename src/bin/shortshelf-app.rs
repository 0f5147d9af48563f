use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use url::Url;

use shortshelf::app::AppState;
use shortshelf::catalog::CatalogStore;
use shortshelf::favorites::{FavoritesStorage, FileKeyValueStore};
use shortshelf::offline::{
    HttpNetwork, LocalFsCacheStorage, Network, OfflineWorker, WorkerConfig,
};
use shortshelf::sheet::SheetClient;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Cache stores and persisted favorites live here.
    #[arg(long, default_value = "workspace-app")]
    data_dir: PathBuf,

    /// Origin serving the app shell and the bundled data file.
    #[arg(long, default_value = "http://127.0.0.1:5173/")]
    upstream: String,

    /// Overrides $SHORTSHELF_SHEET_URL.
    #[arg(long)]
    sheet_url: Option<String>,

    /// Overrides $SHORTSHELF_CACHE_GENERATION.
    #[arg(long)]
    cache_generation: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    shortshelf::logging::init(shortshelf::logging::SERVER_DIRECTIVES)?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting shortshelf-app");

    let sheet_url = match &args.sheet_url {
        Some(raw) => shortshelf::config::parse_sheet_url(raw).context("parse --sheet-url")?,
        None => shortshelf::config::sheet_url_from_env()?,
    };
    let generation = match &args.cache_generation {
        Some(raw) => shortshelf::config::parse_cache_generation(raw)
            .context("parse --cache-generation")?,
        None => shortshelf::config::cache_generation_from_env()?,
    };
    let upstream = Url::parse(&args.upstream).context("parse --upstream")?;

    let network: Arc<dyn Network> = Arc::new(HttpNetwork::default());
    let worker = Arc::new(OfflineWorker::new(
        WorkerConfig::new(generation.clone(), upstream),
        Arc::new(LocalFsCacheStorage::new(&args.data_dir)),
        Arc::clone(&network),
    ));
    // Requests are only accepted once this settles, so no fetch ever sees a half-installed
    // generation. A stored generation with the same tag is reused as is. A failed install
    // leaves the app online-only until the next start.
    if let Err(err) = worker.start().await {
        tracing::error!(?err, generation = %generation, "offline cache unavailable");
    }

    let favorites = FavoritesStorage::new(Arc::new(FileKeyValueStore::new(
        args.data_dir.join("storage"),
    )));
    let catalog = CatalogStore::new(favorites.load().await);
    let state = AppState::new(
        catalog,
        favorites,
        SheetClient::new(sheet_url),
        Arc::clone(&worker),
        network,
    );

    let loader = state.clone();
    tokio::spawn(async move {
        shortshelf::sheet::reload(&loader.sheet, &loader.catalog).await;
    });

    let app = shortshelf::app::router(state);
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(?err, "failed to listen for ctrl-c");
            }
        })
        .await?;
    Ok(())
}
