use crate::db::{Store, StoreKey};
use crate::domain::habits::HabitCategory;
use crate::domain::{self, Record};
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Health,
    Career,
    Wellness,
    Relationships,
    Personal,
}

impl GoalCategory {
    pub const ALL: [GoalCategory; 5] = [
        GoalCategory::Health,
        GoalCategory::Career,
        GoalCategory::Wellness,
        GoalCategory::Relationships,
        GoalCategory::Personal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GoalCategory::Health => "health",
            GoalCategory::Career => "career",
            GoalCategory::Wellness => "wellness",
            GoalCategory::Relationships => "relationships",
            GoalCategory::Personal => "personal",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GoalCategory::Health => "Health & Fitness",
            GoalCategory::Career => "Career & Learning",
            GoalCategory::Wellness => "Mental Wellness",
            GoalCategory::Relationships => "Relationships",
            GoalCategory::Personal => "Personal Growth",
        }
    }

    /// Habit category used for habits picked under this focus area.
    pub fn habit_category(self) -> HabitCategory {
        match self {
            GoalCategory::Health => HabitCategory::Health,
            GoalCategory::Career => HabitCategory::Productivity,
            GoalCategory::Wellness => HabitCategory::Mindfulness,
            GoalCategory::Relationships => HabitCategory::Social,
            GoalCategory::Personal => HabitCategory::Learning,
        }
    }
}

impl fmt::Display for GoalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalCategory {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        GoalCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown goal category: {raw}. Expected one of health, career, wellness, relationships, personal"
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: GoalCategory,
    pub created_at: DateTime<Utc>,
}

impl Record for Goal {
    const KEY: StoreKey = StoreKey::Goals;
    const NAME: &'static str = "Goal";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGoal {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: GoalCategory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<GoalCategory>,
}

pub fn list_goals(store: &Store) -> Result<Vec<Goal>> {
    domain::all(store)
}

pub fn add_goal(store: &Store, new_goal: NewGoal) -> Result<Goal> {
    let title = new_goal.title.trim();
    if title.is_empty() {
        bail!("Goal title must not be empty");
    }

    domain::insert(
        store,
        Goal {
            id: domain::new_id(),
            title: title.to_string(),
            description: new_goal.description.trim().to_string(),
            category: new_goal.category,
            created_at: Utc::now(),
        },
    )
}

pub fn update_goal(store: &Store, id: &str, changes: GoalUpdate) -> Result<Goal> {
    domain::update(store, id, |goal: &mut Goal| {
        if let Some(title) = changes.title {
            let title = title.trim();
            if title.is_empty() {
                bail!("Goal title must not be empty");
            }
            goal.title = title.to_string();
        }
        if let Some(description) = changes.description {
            goal.description = description.trim().to_string();
        }
        if let Some(category) = changes.category {
            goal.category = category;
        }
        Ok(())
    })
}

pub fn delete_goal(store: &Store, id: &str) -> Result<Goal> {
    domain::delete(store, id)
}
