use std::sync::Arc;

use rand::Rng as _;
use serde::Serialize;

use crate::favorites::FavoriteSet;
use crate::records::Record;

pub const CATEGORIES: [&str; 10] = [
    "Relationships",
    "Confidence & Self-Worth",
    "Anxiety & Calm",
    "Career & Purpose",
    "Productivity & Focus",
    "Mindset & Change",
    "Life Coaching Insights",
    "Emotional Balance",
    "Health & Self-Care",
    "Family & Connection",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickPick {
    pub label: &'static str,
    pub category: &'static str,
}

pub const QUICK_PICKS: [QuickPick; 5] = [
    QuickPick {
        label: "Anxious → Calm",
        category: "Anxiety & Calm",
    },
    QuickPick {
        label: "Low → Confident",
        category: "Confidence & Self-Worth",
    },
    QuickPick {
        label: "Stuck → Clear",
        category: "Productivity & Focus",
    },
    QuickPick {
        label: "Tender → Steady",
        category: "Emotional Balance",
    },
    QuickPick {
        label: "Love → Reconnect",
        category: "Relationships",
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub query: String,
    pub active_categories: Vec<String>,
    pub favorites_only: bool,
}

impl FilterState {
    pub fn toggle_category(&mut self, category: &str) {
        if let Some(pos) = self.active_categories.iter().position(|c| c == category) {
            self.active_categories.remove(pos);
        } else {
            self.active_categories.push(category.to_owned());
        }
    }

    pub fn add_category(&mut self, category: &str) {
        if !self.active_categories.iter().any(|c| c == category) {
            self.active_categories.push(category.to_owned());
        }
    }

    pub fn is_category_active(&self, category: &str) -> bool {
        self.active_categories.iter().any(|c| c == category)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded { count: usize },
    Failed { reason: String },
}

impl LoadStatus {
    pub fn message(&self) -> String {
        match self {
            Self::Idle => String::new(),
            Self::Loading => "Loading videos…".to_owned(),
            Self::Loaded { count } => format!("Loaded {count} videos"),
            Self::Failed { .. } => "Couldn't load CSV.".to_owned(),
        }
    }
}

/// Filters `records` by, in order: favorites membership, category substring, and a
/// case-insensitive query over title, tags and category. Each stage applies only when set.
pub fn filter_records<'a>(
    records: &'a [Record],
    filter: &FilterState,
    favorites: &FavoriteSet,
) -> Vec<&'a Record> {
    let query = filter.query.trim().to_lowercase();

    records
        .iter()
        .filter(|r| !filter.favorites_only || favorites.contains(&r.id))
        .filter(|r| {
            filter.active_categories.is_empty()
                || filter
                    .active_categories
                    .iter()
                    .any(|c| r.category.contains(c.as_str()))
        })
        .filter(|r| {
            query.is_empty()
                || r.title.to_lowercase().contains(&query)
                || r.tags.to_lowercase().contains(&query)
                || r.category.to_lowercase().contains(&query)
        })
        .collect()
}

/// Immutable view of everything the filtered list and the rendered page derive from.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub records: Arc<Vec<Record>>,
    pub filter: FilterState,
    pub favorites: FavoriteSet,
    pub status: LoadStatus,
}

impl CatalogSnapshot {
    pub fn filtered(&self) -> Vec<&Record> {
        filter_records(&self.records, &self.filter, &self.favorites)
    }
}

pub struct CatalogStore {
    records: Arc<Vec<Record>>,
    filter: FilterState,
    favorites: FavoriteSet,
    status: LoadStatus,
}

impl CatalogStore {
    pub fn new(favorites: FavoriteSet) -> Self {
        Self {
            records: Arc::new(Vec::new()),
            filter: FilterState::default(),
            favorites,
            status: LoadStatus::Idle,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn favorites(&self) -> &FavoriteSet {
        &self.favorites
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn begin_load(&mut self) {
        self.status = LoadStatus::Loading;
    }

    pub fn replace_records(&mut self, records: Vec<Record>) {
        self.status = LoadStatus::Loaded {
            count: records.len(),
        };
        self.records = Arc::new(records);
    }

    /// Keeps whatever records were loaded before.
    pub fn load_failed(&mut self, reason: impl Into<String>) {
        self.status = LoadStatus::Failed {
            reason: reason.into(),
        };
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.query = query.into();
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.filter.favorites_only = favorites_only;
    }

    pub fn toggle_category(&mut self, category: &str) {
        self.filter.toggle_category(category);
    }

    pub fn apply_quick_pick(&mut self, pick: &QuickPick) {
        self.filter.add_category(pick.category);
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    /// In memory only; `favorites::toggle` also persists. Returns whether `id` is now a favorite.
    pub fn toggle_favorite(&mut self, id: &str) -> bool {
        self.favorites.toggle(id)
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    pub fn filtered(&self) -> Vec<&Record> {
        filter_records(&self.records, &self.filter, &self.favorites)
    }

    pub fn surprise(&self) -> Option<&Record> {
        let filtered = self.filtered();
        if filtered.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..filtered.len());
        Some(filtered[idx])
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            records: Arc::clone(&self.records),
            filter: self.filter.clone(),
            favorites: self.favorites.clone(),
            status: self.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str, category: &str, tags: &str) -> Record {
        Record {
            id: id.to_owned(),
            title: title.to_owned(),
            category: category.to_owned(),
            tags: tags.to_owned(),
            ..Record::default()
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            record("1", "Calm talk", "Anxiety & Calm", ""),
            record("2", "Career tips", "Career & Purpose", ""),
        ]
    }

    fn store_with(records: Vec<Record>) -> CatalogStore {
        let mut store = CatalogStore::new(FavoriteSet::default());
        store.replace_records(records);
        store
    }

    fn ids(records: &[&Record]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn category_and_query_intersect() {
        let mut store = store_with(sample());
        store.toggle_category("Anxiety & Calm");
        store.set_query("calm");
        assert_eq!(ids(&store.filtered()), ["1"]);
    }

    #[test]
    fn unmatched_query_yields_nothing() {
        let mut store = store_with(sample());
        store.set_query("xyz");
        assert!(store.filtered().is_empty());
    }

    #[test]
    fn blank_query_matches_everything() {
        let mut store = store_with(sample());
        store.set_query("   ");
        assert_eq!(store.filtered().len(), 2);
    }

    #[test]
    fn query_searches_tags_case_insensitively() {
        let mut store = store_with(vec![
            record("1", "One", "", "Breathing|Sleep"),
            record("2", "Two", "", "focus"),
        ]);
        store.set_query("SLEEP");
        assert_eq!(ids(&store.filtered()), ["1"]);
    }

    #[test]
    fn any_active_category_matches_by_substring() {
        let mut store = store_with(vec![
            record("1", "", "Relationships|Family & Connection", ""),
            record("2", "", "Career & Purpose", ""),
            record("3", "", "Health & Self-Care", ""),
        ]);
        store.toggle_category("Family & Connection");
        store.toggle_category("Career & Purpose");
        assert_eq!(ids(&store.filtered()), ["1", "2"]);
    }

    #[test]
    fn category_toggle_is_an_involution() {
        let mut store = store_with(sample());
        store.toggle_category("Relationships");
        let before = store.filter().clone();
        store.toggle_category("Anxiety & Calm");
        store.toggle_category("Anxiety & Calm");
        assert_eq!(store.filter(), &before);
    }

    #[test]
    fn quick_pick_adds_without_toggling() {
        let mut store = store_with(sample());
        store.apply_quick_pick(&QUICK_PICKS[0]);
        store.apply_quick_pick(&QUICK_PICKS[0]);
        assert_eq!(store.filter().active_categories, ["Anxiety & Calm"]);
    }

    #[test]
    fn favorites_only_shows_favorited_ids() {
        let mut store = store_with(sample());
        store.toggle_favorite("2");
        store.toggle_favorite("gone-from-catalog");
        store.set_favorites_only(true);
        assert_eq!(ids(&store.filtered()), ["2"]);
    }

    #[test]
    fn starts_with_loaded_favorites() {
        let store = CatalogStore::new(["abc"].into_iter().collect());
        assert!(store.is_favorite("abc"));
        assert!(!store.is_favorite("def"));
    }

    #[test]
    fn clear_filters_keeps_favorites() {
        let mut store = store_with(sample());
        store.toggle_favorite("1");
        store.set_query("calm");
        store.toggle_category("Anxiety & Calm");
        store.set_favorites_only(true);
        store.clear_filters();
        assert_eq!(store.filter(), &FilterState::default());
        assert!(store.is_favorite("1"));
    }

    #[test]
    fn failed_reload_keeps_previous_records() {
        let mut store = store_with(sample());
        store.begin_load();
        store.load_failed("HTTP 500");
        assert_eq!(store.records().len(), 2);
        assert_eq!(store.status().message(), "Couldn't load CSV.");
    }

    #[test]
    fn snapshot_recomputes_after_input_change() {
        let mut store = store_with(sample());
        let first = store.snapshot();
        store.set_query("career");
        let second = store.snapshot();
        assert_eq!(first.filtered().len(), 2);
        assert_eq!(ids(&second.filtered()), ["2"]);
    }

    #[test]
    fn surprise_picks_from_filtered_view() {
        let mut store = store_with(sample());
        store.set_query("career");
        assert_eq!(store.surprise().map(|r| r.id.as_str()), Some("2"));
        store.set_query("xyz");
        assert!(store.surprise().is_none());
    }
}
