use crate::db::{Store, StoreKey};
use crate::domain::{self, Record};
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitCategory {
    Health,
    Productivity,
    Mindfulness,
    Social,
    Learning,
}

impl HabitCategory {
    pub const ALL: [HabitCategory; 5] = [
        HabitCategory::Health,
        HabitCategory::Productivity,
        HabitCategory::Mindfulness,
        HabitCategory::Social,
        HabitCategory::Learning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HabitCategory::Health => "health",
            HabitCategory::Productivity => "productivity",
            HabitCategory::Mindfulness => "mindfulness",
            HabitCategory::Social => "social",
            HabitCategory::Learning => "learning",
        }
    }
}

impl fmt::Display for HabitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HabitCategory {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        HabitCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown habit category: {raw}. Expected one of health, productivity, mindfulness, social, learning"
                )
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            _ => Err(anyhow!("Unknown frequency: {raw}. Expected daily or weekly")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: HabitCategory,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub completed_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub streak: u32,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }

    /// Streak as of `today`; the stored value may be stale after idle days.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        compute_streak(&self.completed_dates, today)
    }
}

impl Record for Habit {
    const KEY: StoreKey = StoreKey::Habits;
    const NAME: &'static str = "Habit";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHabit {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: HabitCategory,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<HabitCategory>,
    pub frequency: Option<Frequency>,
}

/// Consecutive completed days ending today, or ending yesterday while today
/// is still open.
pub fn compute_streak(completed_dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let start = if completed_dates.contains(&today) {
        today
    } else if completed_dates.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    completed_dates
        .range(..=start)
        .rev()
        .zip(0_i64..)
        .take_while(|(date, offset)| **date == start - Duration::days(*offset))
        .count() as u32
}

pub fn list_habits(store: &Store) -> Result<Vec<Habit>> {
    domain::all(store)
}

pub fn add_habit(store: &Store, new_habit: NewHabit) -> Result<Habit> {
    let title = new_habit.title.trim();
    if title.is_empty() {
        bail!("Habit title must not be empty");
    }

    let habit = domain::insert(
        store,
        Habit {
            id: domain::new_id(),
            title: title.to_string(),
            description: new_habit.description.trim().to_string(),
            category: new_habit.category,
            frequency: new_habit.frequency,
            completed_dates: BTreeSet::new(),
            streak: 0,
            created_at: Utc::now(),
        },
    )?;

    info!(habit = %habit.id, title = %habit.title, "habit added");
    Ok(habit)
}

pub fn update_habit(store: &Store, id: &str, changes: HabitUpdate) -> Result<Habit> {
    domain::update(store, id, |habit: &mut Habit| {
        if let Some(title) = changes.title {
            let title = title.trim();
            if title.is_empty() {
                bail!("Habit title must not be empty");
            }
            habit.title = title.to_string();
        }
        if let Some(description) = changes.description {
            habit.description = description.trim().to_string();
        }
        if let Some(category) = changes.category {
            habit.category = category;
        }
        if let Some(frequency) = changes.frequency {
            habit.frequency = frequency;
        }
        Ok(())
    })
}

pub fn delete_habit(store: &Store, id: &str) -> Result<Habit> {
    let removed = domain::delete::<Habit>(store, id)?;
    info!(habit = %removed.id, "habit deleted");
    Ok(removed)
}

pub fn complete_habit(store: &Store, id: &str, today: NaiveDate) -> Result<Habit> {
    let habit = domain::update(store, id, |habit: &mut Habit| {
        habit.completed_dates.insert(today);
        habit.streak = compute_streak(&habit.completed_dates, today);
        Ok(())
    })?;

    info!(habit = %habit.id, streak = habit.streak, "habit completed");
    Ok(habit)
}

pub fn uncomplete_habit(store: &Store, id: &str, today: NaiveDate) -> Result<Habit> {
    let habit = domain::update(store, id, |habit: &mut Habit| {
        habit.completed_dates.remove(&today);
        habit.streak = compute_streak(&habit.completed_dates, today);
        Ok(())
    })?;

    info!(habit = %habit.id, streak = habit.streak, "habit completion cleared");
    Ok(habit)
}

pub fn toggle_habit(store: &Store, id: &str, today: NaiveDate) -> Result<Habit> {
    let completed = list_habits(store)?
        .iter()
        .find(|habit| habit.id == id)
        .map(|habit| habit.is_completed_on(today))
        .ok_or_else(|| anyhow!("Habit not found: {id}"))?;

    if completed {
        uncomplete_habit(store, id, today)
    } else {
        complete_habit(store, id, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
    }

    fn dates(raw: &[&str]) -> BTreeSet<NaiveDate> {
        raw.iter().map(|value| day(value)).collect()
    }

    fn sample_habit(store: &Store) -> Habit {
        add_habit(
            store,
            NewHabit {
                title: "Morning meditation".to_string(),
                description: "10 min mindfulness".to_string(),
                category: HabitCategory::Mindfulness,
                frequency: Frequency::Daily,
            },
        )
        .expect("habit")
    }

    #[test]
    fn streak_counts_three_consecutive_days() {
        let today = day("2026-03-10");
        let completed = dates(&["2026-03-10", "2026-03-09", "2026-03-08"]);
        assert_eq!(compute_streak(&completed, today), 3);
    }

    #[test]
    fn streak_stops_at_a_gap() {
        let today = day("2026-03-10");
        let completed = dates(&["2026-03-10", "2026-03-08"]);
        assert_eq!(compute_streak(&completed, today), 1);
    }

    #[test]
    fn streak_survives_until_today_is_done() {
        let today = day("2026-03-10");
        assert_eq!(compute_streak(&dates(&["2026-03-09", "2026-03-08"]), today), 2);
        assert_eq!(compute_streak(&dates(&["2026-03-08"]), today), 0);
        assert_eq!(compute_streak(&BTreeSet::new(), today), 0);
    }

    #[test]
    fn streak_crosses_month_boundaries() {
        let today = day("2026-03-01");
        let completed = dates(&["2026-03-01", "2026-02-28", "2026-02-27", "2026-01-31"]);
        assert_eq!(compute_streak(&completed, today), 3);
    }

    #[test]
    fn toggling_twice_restores_the_habit() {
        let store = Store::open_in_memory().expect("store");
        let habit = sample_habit(&store);
        let today = day("2026-03-10");

        complete_habit(&store, &habit.id, day("2026-03-09")).expect("seed yesterday");
        let before = list_habits(&store).expect("list")[0].clone();
        let before_streak = compute_streak(&before.completed_dates, today);

        let toggled = toggle_habit(&store, &habit.id, today).expect("first toggle");
        assert!(toggled.is_completed_on(today));
        assert_eq!(toggled.streak, 2);

        let restored = toggle_habit(&store, &habit.id, today).expect("second toggle");
        assert_eq!(restored.completed_dates, before.completed_dates);
        assert_eq!(restored.streak, before_streak);
    }

    #[test]
    fn completing_twice_keeps_dates_unique() {
        let store = Store::open_in_memory().expect("store");
        let habit = sample_habit(&store);
        let today = day("2026-03-10");

        complete_habit(&store, &habit.id, today).expect("first");
        let again = complete_habit(&store, &habit.id, today).expect("second");
        assert_eq!(again.completed_dates.len(), 1);
        assert_eq!(again.streak, 1);
    }

    #[test]
    fn delete_removes_habit() {
        let store = Store::open_in_memory().expect("store");
        let habit = sample_habit(&store);

        delete_habit(&store, &habit.id).expect("delete");
        assert!(list_habits(&store).expect("list").is_empty());
        assert!(toggle_habit(&store, &habit.id, day("2026-03-10")).is_err());
    }

    #[test]
    fn completed_dates_serialize_as_iso_strings() {
        let store = Store::open_in_memory().expect("store");
        let habit = sample_habit(&store);
        let completed = complete_habit(&store, &habit.id, day("2026-03-10")).expect("complete");

        let value = serde_json::to_value(&completed).expect("json");
        assert_eq!(value["completed_dates"], serde_json::json!(["2026-03-10"]));
        assert_eq!(value["category"], "mindfulness");
    }
}
