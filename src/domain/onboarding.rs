use crate::db::{Store, StoreKey};
use crate::domain::goals::{Goal, GoalCategory, NewGoal, add_goal};
use crate::domain::habits::{Frequency, Habit, NewHabit, add_habit};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SuggestedHabit {
    pub title: &'static str,
    pub description: &'static str,
}

const fn suggestion(title: &'static str, description: &'static str) -> SuggestedHabit {
    SuggestedHabit { title, description }
}

pub fn suggested_habits(category: GoalCategory) -> &'static [SuggestedHabit] {
    static HEALTH: [SuggestedHabit; 3] = [
        suggestion("Morning exercise", "30 minutes of movement"),
        suggestion("Drink 8 glasses of water", "Stay hydrated"),
        suggestion("Sleep 8 hours", "Quality rest"),
    ];
    static CAREER: [SuggestedHabit; 3] = [
        suggestion("Learn something new", "30 min of learning"),
        suggestion("Work on important tasks first", "Deep work"),
        suggestion("Review goals weekly", "Stay on track"),
    ];
    static WELLNESS: [SuggestedHabit; 3] = [
        suggestion("Morning meditation", "10 min mindfulness"),
        suggestion("Gratitude journaling", "3 things grateful for"),
        suggestion("Digital detox evening", "No screens before bed"),
    ];
    static RELATIONSHIPS: [SuggestedHabit; 3] = [
        suggestion("Connect with loved ones", "Call or message someone"),
        suggestion("Active listening", "Be fully present"),
        suggestion("Express appreciation", "Say thank you"),
    ];
    static PERSONAL: [SuggestedHabit; 3] = [
        suggestion("Read for 20 minutes", "Personal development"),
        suggestion("Reflect on the day", "Evening review"),
        suggestion("Try something new", "Step outside comfort zone"),
    ];

    match category {
        GoalCategory::Health => &HEALTH,
        GoalCategory::Career => &CAREER,
        GoalCategory::Wellness => &WELLNESS,
        GoalCategory::Relationships => &RELATIONSHIPS,
        GoalCategory::Personal => &PERSONAL,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoalDraft {
    pub category: GoalCategory,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A suggested habit picked by its position in the category's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HabitChoice {
    pub category: GoalCategory,
    pub index: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardingPlan {
    #[serde(default)]
    pub goals: Vec<GoalDraft>,
    #[serde(default)]
    pub habits: Vec<HabitChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnboardingOutcome {
    pub goals: Vec<Goal>,
    pub habits: Vec<Habit>,
}

pub fn is_onboarding_complete(store: &Store) -> Result<bool> {
    Ok(store
        .get::<bool>(StoreKey::OnboardingComplete)?
        .unwrap_or(false))
}

pub fn set_onboarding_complete(store: &Store) -> Result<()> {
    store.set(StoreKey::OnboardingComplete, &true)
}

/// Saves goals with a title and the chosen suggested habits, then marks
/// onboarding done. Unknown habit choices are skipped.
pub fn complete_onboarding(store: &Store, plan: &OnboardingPlan) -> Result<OnboardingOutcome> {
    let goals = plan
        .goals
        .iter()
        .filter(|draft| !draft.title.trim().is_empty())
        .map(|draft| {
            add_goal(
                store,
                NewGoal {
                    title: draft.title.clone(),
                    description: draft.description.clone(),
                    category: draft.category,
                },
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut seen = Vec::new();
    let mut habits = Vec::new();
    for choice in &plan.habits {
        if seen.contains(choice) {
            continue;
        }
        seen.push(*choice);

        let Some(suggested) = suggested_habits(choice.category).get(choice.index) else {
            warn!(
                category = %choice.category,
                index = choice.index,
                "unknown suggested habit skipped"
            );
            continue;
        };

        habits.push(add_habit(
            store,
            NewHabit {
                title: suggested.title.to_string(),
                description: suggested.description.to_string(),
                category: choice.category.habit_category(),
                frequency: Frequency::Daily,
            },
        )?);
    }

    set_onboarding_complete(store)?;
    info!(
        goals = goals.len(),
        habits = habits.len(),
        "onboarding completed"
    );

    Ok(OnboardingOutcome { goals, habits })
}
