use std::{fmt::Display, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{momentum::FocusSession, streak::CompletionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Done at most once per day, builds a streak.
    Habit,
    /// Done once. A later completion replaces the earlier one.
    Task,
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Habit => write!(f, "habit"),
            ItemKind::Task => write!(f, "task"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntity {
    pub id: Arc<str>,
    pub title: String,
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    /// Streak as of the last recomputation. Informational only, every read recomputes it.
    #[serde(default)]
    pub streak: u32,
}

/// A line of `completions.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntity {
    pub item_id: Arc<str>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub at: DateTime<Utc>,
    pub completed: bool,
}

impl From<CompletionEntity> for CompletionEvent {
    fn from(
        CompletionEntity {
            item_id,
            at,
            completed,
        }: CompletionEntity,
    ) -> Self {
        CompletionEvent {
            item_id,
            occurred_at: at,
            completed,
        }
    }
}

impl From<CompletionEvent> for CompletionEntity {
    fn from(
        CompletionEvent {
            item_id,
            occurred_at,
            completed,
        }: CompletionEvent,
    ) -> Self {
        CompletionEntity {
            item_id,
            at: occurred_at,
            completed,
        }
    }
}

/// A line of `focus.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSessionEntity {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub started_at: DateTime<Utc>,
    pub minutes: u32,
}

impl From<FocusSessionEntity> for FocusSession {
    fn from(value: FocusSessionEntity) -> Self {
        FocusSession {
            started_at: value.started_at,
            duration_minutes: value.minutes,
        }
    }
}

/// Turns a title into an id such as `morning-run`. When the id is taken a numeric suffix is
/// appended, `morning-run-2`, `morning-run-3` and so on.
pub fn make_item_id<'a>(
    title: &str,
    taken: impl IntoIterator<Item = &'a str> + Clone,
) -> Arc<str> {
    let mut slug = String::new();
    for c in title.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("item");
    }

    let is_taken = |candidate: &str| taken.clone().into_iter().any(|id| id == candidate);
    if !is_taken(&slug) {
        return slug.into();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{slug}-{suffix}");
        if !is_taken(&candidate) {
            return candidate.into();
        }
        suffix += 1;
    }
}
