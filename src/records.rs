use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::table::{self, Row};

pub const FIELD_NAMES: [&str; 6] = ["id", "url", "title", "category", "tags", "duration"];

const LIST_SEPARATOR: char = '|';

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub url: String,
    pub title: String,
    pub category: String,
    pub tags: String,
    pub duration: String,
}

impl Record {
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() || !self.url.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        split_list(&self.category)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        split_list(&self.tags)
    }

    pub fn thumbnail_url(&self) -> String {
        format!("https://img.youtube.com/vi/{}/hqdefault.jpg", self.id)
    }

    pub fn embed_url(&self) -> String {
        format!(
            "https://www.youtube-nocookie.com/embed/{}?autoplay=0&modestbranding=1&playsinline=1&rel=0",
            self.id
        )
    }

    /// Direct link used where inline embeds are unreliable; prefers the row's own `url`.
    pub fn watch_url(&self) -> String {
        if self.url.is_empty() {
            format!("https://youtu.be/{}", self.id)
        } else {
            self.url.clone()
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(LIST_SEPARATOR).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default)]
struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(header: &Row) -> Self {
        let mut columns = HashMap::new();
        for (i, cell) in header.iter().enumerate() {
            // First occurrence wins when a header name repeats.
            columns.entry(cell.trim().to_lowercase()).or_insert(i);
        }
        Self { columns }
    }

    fn cell(&self, row: &Row, name: &str) -> String {
        self.columns
            .get(name)
            .and_then(|&i| row.get(i))
            .cloned()
            .unwrap_or_default()
    }
}

/// Maps header-indexed rows onto [`Record`]s.
///
/// Blank rows and rows with neither `id` nor `url` are dropped. Missing columns and short rows
/// produce empty fields; this never fails.
pub fn normalize(rows: &[Row]) -> Vec<Record> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    let index = HeaderIndex::new(header);

    data.iter()
        .filter(|row| !is_blank(row))
        .map(|row| Record {
            id: index.cell(row, "id"),
            url: index.cell(row, "url"),
            title: index.cell(row, "title"),
            category: index.cell(row, "category"),
            tags: index.cell(row, "tags"),
            duration: index.cell(row, "duration"),
        })
        .filter(Record::is_valid)
        .collect()
}

pub fn parse_records(text: &str) -> Vec<Record> {
    normalize(&table::parse(text))
}

fn is_blank(row: &Row) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}
