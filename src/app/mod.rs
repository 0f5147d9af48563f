pub mod install;
pub mod routes;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::app::install::InstallPromptSlot;
use crate::catalog::CatalogStore;
use crate::favorites::FavoritesStorage;
use crate::offline::{Network, OfflineWorker};
use crate::sheet::SheetClient;

pub use routes::router;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<RwLock<CatalogStore>>,
    pub favorites: Arc<FavoritesStorage>,
    pub sheet: Arc<SheetClient>,
    pub worker: Arc<OfflineWorker>,
    /// Used directly when the worker failed to install.
    pub network: Arc<dyn Network>,
    pub install_prompt: Arc<InstallPromptSlot>,
}

impl AppState {
    pub fn new(
        catalog: CatalogStore,
        favorites: FavoritesStorage,
        sheet: SheetClient,
        worker: Arc<OfflineWorker>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            favorites: Arc::new(favorites),
            sheet: Arc::new(sheet),
            worker,
            network,
            install_prompt: Arc::new(InstallPromptSlot::default()),
        }
    }
}
