//! Identifier extraction from the free-text description field.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::EventRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdField {
    User,
    Attempt,
    Quiz,
    Item,
}

impl IdField {
    /// Attempt and quiz ids only disambiguate descriptions; they are not kept.
    pub fn retained(&self) -> bool {
        matches!(self, IdField::User | IdField::Item)
    }
}

struct IdPattern {
    field: IdField,
    regex: Regex,
}

static ID_PATTERNS: Lazy<Vec<IdPattern>> = Lazy::new(|| {
    [
        (IdField::User, r"user with id '(\d+)'"),
        (IdField::Attempt, r"attempt with id '(\d+)'"),
        (IdField::Quiz, r"course module id '(\d+)'"),
        (IdField::Item, r"Tétel (\d+) azonosítóval"),
    ]
    .into_iter()
    .map(|(field, pattern)| IdPattern {
        field,
        regex: Regex::new(pattern).expect("identifier pattern is valid"),
    })
    .collect()
});

/// Runs every pattern over `text` once; fields that do not match are absent.
pub fn extract_fields(text: &str) -> BTreeMap<IdField, i64> {
    ID_PATTERNS
        .iter()
        .filter_map(|pattern| {
            let caps = pattern.regex.captures(text)?;
            let value = caps.get(1)?.as_str().parse::<i64>().ok()?;
            Some((pattern.field, value))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractedIds {
    pub user_id: Option<i64>,
    pub item_id: Option<i64>,
}

pub fn extract_ids(description: &str) -> ExtractedIds {
    let fields: BTreeMap<IdField, i64> = extract_fields(description)
        .into_iter()
        .filter(|(field, _)| field.retained())
        .collect();

    ExtractedIds {
        user_id: fields.get(&IdField::User).copied(),
        item_id: fields.get(&IdField::Item).copied(),
    }
}

pub fn add_extracted_ids(rows: Vec<EventRow>) -> Vec<EventRow> {
    rows.into_iter()
        .map(|mut row| {
            let ids = extract_ids(&row.description);
            row.user_id = ids.user_id;
            row.item_id = ids.item_id;
            row
        })
        .collect()
}
