use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Network, writing successes into the store; the store only when the network fails.
    NetworkFirst,
    /// Store if present, otherwise network without writing back.
    CacheFirst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePredicate {
    PathSuffix(String),
    PathPrefix(String),
    Path(String),
}

impl RoutePredicate {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::PathSuffix(suffix) => path.ends_with(suffix.as_str()),
            Self::PathPrefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Path(exact) => path == exact,
        }
    }
}

/// Ordered `(predicate, policy)` pairs; the first matching predicate decides.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(RoutePredicate, FetchPolicy)>,
    fallback: FetchPolicy,
}

impl RouteTable {
    pub fn new(fallback: FetchPolicy) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    pub fn route(mut self, predicate: RoutePredicate, policy: FetchPolicy) -> Self {
        self.routes.push((predicate, policy));
        self
    }

    pub fn select(&self, path: &str) -> FetchPolicy {
        self.routes
            .iter()
            .find(|(predicate, _)| predicate.matches(path))
            .map_or(self.fallback, |(_, policy)| *policy)
    }
}

impl Default for RouteTable {
    /// Tabular data is volatile; everything else is shell.
    fn default() -> Self {
        Self::new(FetchPolicy::CacheFirst).route(
            RoutePredicate::PathSuffix(".csv".to_owned()),
            FetchPolicy::NetworkFirst,
        )
    }
}
