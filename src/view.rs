use serde::Serialize;

use crate::catalog::{CATEGORIES, CatalogSnapshot, QUICK_PICKS, QuickPick};
use crate::records::Record;

const MAX_TAGS_PER_CARD: usize = 8;
const EMPTY_MESSAGE: &str =
    "No videos match your filters. Try clearing them or searching different terms.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Inline players are unreliable; cards link out from a thumbnail.
    Ios,
    Other,
}

impl Platform {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if ["iPhone", "iPad", "iPod"]
            .iter()
            .any(|device| user_agent.contains(device))
        {
            Self::Ios
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Player {
    Thumbnail { image: String, href: String },
    Embed { src: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryChip {
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub anchor: String,
    pub id: String,
    pub title: String,
    pub player: Player,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub favorite: bool,
    pub favorite_label: &'static str,
    pub duration_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogView {
    pub status_message: String,
    pub query: String,
    pub favorites_only: bool,
    pub quick_picks: Vec<QuickPick>,
    pub categories: Vec<CategoryChip>,
    pub cards: Vec<Card>,
    pub empty_message: Option<&'static str>,
}

pub fn render(snapshot: &CatalogSnapshot, platform: Platform) -> CatalogView {
    let cards: Vec<Card> = snapshot
        .filtered()
        .into_iter()
        .map(|record| render_card(record, snapshot.favorites.contains(&record.id), platform))
        .collect();

    CatalogView {
        status_message: snapshot.status.message(),
        query: snapshot.filter.query.clone(),
        favorites_only: snapshot.filter.favorites_only,
        quick_picks: QUICK_PICKS.to_vec(),
        categories: CATEGORIES
            .iter()
            .map(|label| CategoryChip {
                label: (*label).to_owned(),
                active: snapshot.filter.is_category_active(label),
            })
            .collect(),
        empty_message: cards.is_empty().then_some(EMPTY_MESSAGE),
        cards,
    }
}

fn render_card(record: &Record, favorite: bool, platform: Platform) -> Card {
    let player = match platform {
        Platform::Ios => Player::Thumbnail {
            image: record.thumbnail_url(),
            href: record.watch_url(),
        },
        Platform::Other => Player::Embed {
            src: record.embed_url(),
        },
    };

    let tags = if record.tags.trim().is_empty() {
        Vec::new()
    } else {
        record
            .tags
            .split('|')
            .take(MAX_TAGS_PER_CARD)
            .map(|t| format!("#{t}"))
            .collect()
    };

    Card {
        anchor: format!("card-{}", record.id),
        id: record.id.clone(),
        title: record.title.clone(),
        player,
        categories: record.categories().map(str::to_owned).collect(),
        tags,
        favorite,
        favorite_label: if favorite { "★ Favorited" } else { "☆ Favorite" },
        duration_label: (!record.duration.is_empty()).then(|| format!("~{}s", record.duration)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{FilterState, LoadStatus};

    fn snapshot(records: Vec<Record>, filter: FilterState, favorites: &[&str]) -> CatalogSnapshot {
        CatalogSnapshot {
            records: Arc::new(records),
            filter,
            favorites: favorites.iter().copied().collect(),
            status: LoadStatus::Loaded { count: 1 },
        }
    }

    fn video() -> Record {
        Record {
            id: "abc".to_owned(),
            title: "Calm talk".to_owned(),
            category: "Anxiety & Calm|Emotional Balance".to_owned(),
            tags: (1..=10).map(|i| format!("t{i}")).collect::<Vec<_>>().join("|"),
            duration: "45".to_owned(),
            ..Record::default()
        }
    }

    #[test]
    fn detects_ios_devices() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        assert_eq!(Platform::from_user_agent(ua), Platform::Ios);
        assert_eq!(Platform::from_user_agent("Mozilla/5.0 (X11; Linux)"), Platform::Other);
    }

    #[test]
    fn card_shows_first_eight_tags_and_duration() {
        let view = render(
            &snapshot(vec![video()], FilterState::default(), &["abc"]),
            Platform::Other,
        );
        let card = &view.cards[0];
        assert_eq!(card.tags.len(), 8);
        assert_eq!(card.tags[0], "#t1");
        assert_eq!(card.categories, ["Anxiety & Calm", "Emotional Balance"]);
        assert_eq!(card.duration_label.as_deref(), Some("~45s"));
        assert_eq!(card.favorite_label, "★ Favorited");
        assert_eq!(card.anchor, "card-abc");
        assert!(matches!(card.player, Player::Embed { .. }));
        assert_eq!(view.status_message, "Loaded 1 videos");
    }

    #[test]
    fn ios_cards_link_out_from_thumbnail() {
        let view = render(
            &snapshot(vec![video()], FilterState::default(), &[]),
            Platform::Ios,
        );
        assert_eq!(
            view.cards[0].player,
            Player::Thumbnail {
                image: "https://img.youtube.com/vi/abc/hqdefault.jpg".to_owned(),
                href: "https://youtu.be/abc".to_owned(),
            }
        );
        assert_eq!(view.cards[0].favorite_label, "☆ Favorite");
    }

    #[test]
    fn empty_filter_result_carries_message_and_active_chips() {
        let filter = FilterState {
            query: "nothing matches".to_owned(),
            active_categories: vec!["Relationships".to_owned()],
            favorites_only: false,
        };
        let view = render(&snapshot(vec![video()], filter, &[]), Platform::Other);
        assert!(view.cards.is_empty());
        assert_eq!(view.empty_message, Some(EMPTY_MESSAGE));
        let active: Vec<_> = view
            .categories
            .iter()
            .filter(|chip| chip.active)
            .map(|chip| chip.label.as_str())
            .collect();
        assert_eq!(active, ["Relationships"]);
    }

    #[test]
    fn missing_duration_and_tags_render_nothing() {
        let record = Record {
            id: "x".to_owned(),
            tags: "  ".to_owned(),
            ..Record::default()
        };
        let view = render(
            &snapshot(vec![record], FilterState::default(), &[]),
            Platform::Other,
        );
        assert!(view.cards[0].tags.is_empty());
        assert!(view.cards[0].duration_label.is_none());
    }
}
