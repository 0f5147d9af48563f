//! Offline interception layer: a versioned response store pre-populated with the app shell,
//! plus per-request network-first / cache-first policies.

pub mod network;
pub mod policy;
pub mod request;
pub mod storage;
pub mod worker;

pub use network::{HttpNetwork, Network};
pub use policy::{FetchPolicy, RoutePredicate, RouteTable};
pub use request::{FetchRequest, FetchResponse};
pub use storage::{CacheStorage, LocalFsCacheStorage, MemoryCacheStorage};
pub use worker::{OfflineWorker, WorkerConfig, WorkerState};
