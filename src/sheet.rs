use anyhow::Context as _;
use reqwest::header::{ACCEPT, CACHE_CONTROL, PRAGMA};
use url::Url;

use crate::catalog::CatalogStore;
use crate::records::{self, Record};

#[derive(Debug, Clone)]
pub struct SheetClient {
    client: reqwest::Client,
    url: Url,
}

impl SheetClient {
    pub fn new(url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches the raw table, bypassing intermediate caches.
    pub async fn fetch_text(&self) -> anyhow::Result<String> {
        let resp = self
            .client
            .get(self.url.clone())
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .header(ACCEPT, "text/csv, text/plain;q=0.9, */*;q=0.1")
            .send()
            .await
            .with_context(|| format!("request sheet: {}", self.url))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {}", status.as_u16());
        }
        resp.text().await.context("read sheet body")
    }

    pub async fn fetch_records(&self) -> anyhow::Result<Vec<Record>> {
        let text = self.fetch_text().await?;
        Ok(records::parse_records(&text))
    }
}

/// Runs one load cycle against `store`: marks it loading, then replaces the records or records
/// the failure while keeping the previous ones.
pub async fn reload(sheet: &SheetClient, store: &tokio::sync::RwLock<CatalogStore>) -> bool {
    store.write().await.begin_load();

    match sheet.fetch_records().await {
        Ok(records) => {
            tracing::info!(count = records.len(), url = %sheet.url(), "loaded catalog");
            store.write().await.replace_records(records);
            true
        }
        Err(err) => {
            tracing::warn!(?err, url = %sheet.url(), "failed to load catalog");
            store.write().await.load_failed(format!("{err:#}"));
            false
        }
    }
}
