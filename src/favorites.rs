use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::catalog::CatalogStore;

pub const FAVORITES_KEY: &str = "shortshelf_favs";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One file per key under `base_dir`, replaced atomically on write.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn key_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            anyhow::bail!("invalid storage key: {key:?}");
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read: {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.key_path(key)?;
        write_atomic(&path, value.as_bytes()).await
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<BTreeMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteSet {
    ids: BTreeSet<String>,
}

impl FavoriteSet {
    /// Reads the persisted set. Absent, unreadable or malformed values load as an empty set.
    pub async fn load(store: &dyn KeyValueStore) -> Self {
        let raw = match store.get(FAVORITES_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::default(),
            Err(err) => {
                tracing::warn!(?err, "favorites store unavailable; starting empty");
                return Self::default();
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => Self {
                ids: ids.into_iter().collect(),
            },
            Err(err) => {
                tracing::warn!(?err, "stored favorites are malformed; starting empty");
                Self::default()
            }
        }
    }

    /// Best-effort write; failures are logged and dropped.
    pub async fn save(&self, store: &dyn KeyValueStore) {
        let result = match serde_json::to_string(&self.to_vec()).context("serialize favorites") {
            Ok(json) => store.set(FAVORITES_KEY, &json).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::warn!(count = self.len(), ?err, "failed to persist favorites");
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Adds `id` if absent, removes it if present. Returns whether it is now a favorite.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_owned());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Persists the favorites held by a shared catalog.
///
/// Writes are serialized and each one snapshots the catalog only once it holds the write
/// lock, so the file always ends with the latest set and no disk I/O runs under the catalog
/// lock.
pub struct FavoritesStorage {
    store: Arc<dyn KeyValueStore>,
    writes: tokio::sync::Mutex<()>,
}

impl FavoritesStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            writes: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn load(&self) -> FavoriteSet {
        FavoriteSet::load(self.store.as_ref()).await
    }

    pub async fn persist(&self, catalog: &RwLock<CatalogStore>) {
        let _write = self.writes.lock().await;
        let latest = catalog.read().await.favorites().clone();
        latest.save(self.store.as_ref()).await;
    }
}

/// Toggles `id` in the shared catalog and persists the result. Returns whether `id` is now a
/// favorite.
pub async fn toggle(catalog: &RwLock<CatalogStore>, storage: &FavoritesStorage, id: &str) -> bool {
    let now_favorite = catalog.write().await.toggle_favorite(id);
    storage.persist(catalog).await;
    now_favorite
}
