use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use tokio::fs;
use tokio::sync::RwLock;

use crate::offline::request::{FetchRequest, FetchResponse};

/// Named response stores, one per cache generation.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
    /// Creates the named store if it does not exist yet.
    async fn open(&self, name: &str) -> anyhow::Result<()>;
    /// Returns whether a store was removed.
    async fn delete(&self, name: &str) -> anyhow::Result<bool>;
    async fn lookup(
        &self,
        name: &str,
        request: &FetchRequest,
    ) -> anyhow::Result<Option<FetchResponse>>;
    /// Replaces any entry with the same request identity.
    async fn put(
        &self,
        name: &str,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> anyhow::Result<()>;
}

fn validate_store_name(name: &str) -> anyhow::Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        anyhow::bail!("invalid cache store name: {name:?}");
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    stored_at: DateTime<Utc>,
    response: FetchResponse,
}

#[derive(Debug, Clone)]
pub struct LocalFsCacheStorage {
    base_dir: PathBuf,
}

impl LocalFsCacheStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn caches_dir(&self) -> PathBuf {
        self.base_dir.join("caches")
    }

    fn store_dir(&self, name: &str) -> anyhow::Result<PathBuf> {
        validate_store_name(name)?;
        Ok(self.caches_dir().join(name))
    }

    fn entry_path(&self, name: &str, request: &FetchRequest) -> anyhow::Result<PathBuf> {
        let digest = sha2::Sha256::digest(request.cache_key().as_bytes());
        Ok(self
            .store_dir(name)?
            .join(format!("{}.json", hex::encode(digest))))
    }
}

#[async_trait]
impl CacheStorage for LocalFsCacheStorage {
    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let dir = self.caches_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read caches dir: {}", dir.display()));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_store_name(name).is_ok() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open(&self, name: &str) -> anyhow::Result<()> {
        let dir = self.store_dir(name)?;
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create cache store: {}", dir.display()))
    }

    async fn delete(&self, name: &str) -> anyhow::Result<bool> {
        let dir = self.store_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("delete cache store: {}", dir.display())),
        }
    }

    async fn lookup(
        &self,
        name: &str,
        request: &FetchRequest,
    ) -> anyhow::Result<Option<FetchResponse>> {
        let path = self.entry_path(name, request)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("read cache entry: {}", path.display()));
            }
        };
        let entry: StoredEntry = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse cache entry: {}", path.display()))?;
        // Digest collisions are not expected; treat a mismatch as a miss.
        if entry.key != request.cache_key() {
            return Ok(None);
        }
        Ok(Some(entry.response))
    }

    async fn put(
        &self,
        name: &str,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> anyhow::Result<()> {
        let path = self.entry_path(name, request)?;
        let entry = StoredEntry {
            key: request.cache_key(),
            stored_at: Utc::now(),
            response: response.clone(),
        };
        write_json_atomic(&path, &entry).await
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec(value).context("serialize cache entry")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    stores: RwLock<BTreeMap<String, BTreeMap<String, FetchResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.stores.read().await.keys().cloned().collect())
    }

    async fn open(&self, name: &str) -> anyhow::Result<()> {
        validate_store_name(name)?;
        self.stores
            .write()
            .await
            .entry(name.to_owned())
            .or_default();
        Ok(())
    }

    async fn delete(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.stores.write().await.remove(name).is_some())
    }

    async fn lookup(
        &self,
        name: &str,
        request: &FetchRequest,
    ) -> anyhow::Result<Option<FetchResponse>> {
        let stores = self.stores.read().await;
        Ok(stores
            .get(name)
            .and_then(|store| store.get(&request.cache_key()))
            .cloned())
    }

    async fn put(
        &self,
        name: &str,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> anyhow::Result<()> {
        validate_store_name(name)?;
        self.stores
            .write()
            .await
            .entry(name.to_owned())
            .or_default()
            .insert(request.cache_key(), response.clone());
        Ok(())
    }
}
