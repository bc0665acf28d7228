use crate::db::{Store, StoreKey};
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Achievement {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

const CATALOG: [(&str, &str, &str, &str); 5] = [
    ("first-step", "First Step", "Complete onboarding and set your first goal", "sparkles"),
    ("habit-starter", "Habit Starter", "Complete a habit for the first time", "check"),
    ("week-warrior", "Week Warrior", "Keep a habit streak for 7 days", "flame"),
    ("open-heart", "Open Heart", "Have your first conversation with the coach", "message"),
    ("reflective-soul", "Reflective Soul", "Write your first evening journal entry", "moon"),
];

/// The fixed catalog merged with stored unlock times.
pub fn get_achievements(store: &Store) -> Result<Vec<Achievement>> {
    let unlocked: HashMap<String, DateTime<Utc>> =
        store.get(StoreKey::Achievements)?.unwrap_or_default();

    Ok(CATALOG
        .iter()
        .map(|(id, title, description, icon)| Achievement {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            unlocked_at: unlocked.get(*id).copied(),
        })
        .collect())
}

/// Marks a catalog entry unlocked; an already unlocked entry keeps its
/// original time.
pub fn unlock_achievement(store: &Store, id: &str, at: DateTime<Utc>) -> Result<Achievement> {
    if !CATALOG.iter().any(|(known, ..)| *known == id) {
        bail!("Achievement not found: {id}");
    }

    let mut unlocked: HashMap<String, DateTime<Utc>> =
        store.get(StoreKey::Achievements)?.unwrap_or_default();
    if !unlocked.contains_key(id) {
        unlocked.insert(id.to_string(), at);
        store.set(StoreKey::Achievements, &unlocked)?;
        info!(achievement = id, "achievement unlocked");
    }

    get_achievements(store)?
        .into_iter()
        .find(|achievement| achievement.id == id)
        .ok_or_else(|| anyhow!("Achievement not found: {id}"))
}
