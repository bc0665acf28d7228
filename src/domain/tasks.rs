use crate::ai::{self, LanguageModel, PreviousDay, TopicRef};
use crate::db::{Store, StoreKey};
use crate::domain::goals::list_goals;
use crate::domain::habits::list_habits;
use crate::domain::{self, Record};
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(anyhow!("Unknown priority: {raw}. Expected low, medium or high")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub date: NaiveDate,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl Record for Task {
    const KEY: StoreKey = StoreKey::Tasks;
    const NAME: &'static str = "Task";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A task as proposed by a user or by the model, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub date: Option<NaiveDate>,
}

pub fn list_tasks(store: &Store) -> Result<Vec<Task>> {
    domain::all(store)
}

pub fn tasks_for_date(store: &Store, date: NaiveDate) -> Result<Vec<Task>> {
    Ok(list_tasks(store)?
        .into_iter()
        .filter(|task| task.date == date)
        .collect())
}

pub fn add_task(store: &Store, draft: TaskDraft, date: NaiveDate) -> Result<Task> {
    let title = draft.title.trim();
    if title.is_empty() {
        bail!("Task title must not be empty");
    }

    domain::insert(
        store,
        Task {
            id: domain::new_id(),
            title: title.to_string(),
            description: draft
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            completed: false,
            date,
            priority: draft.priority,
            created_at: Utc::now(),
        },
    )
}

/// Blank drafts are skipped rather than failing the whole batch.
pub fn add_tasks(store: &Store, drafts: Vec<TaskDraft>, date: NaiveDate) -> Result<Vec<Task>> {
    drafts
        .into_iter()
        .filter(|draft| !draft.title.trim().is_empty())
        .map(|draft| add_task(store, draft, date))
        .collect()
}

pub fn toggle_task(store: &Store, id: &str) -> Result<Task> {
    domain::update(store, id, |task: &mut Task| {
        task.completed = !task.completed;
        Ok(())
    })
}

pub fn update_task(store: &Store, id: &str, changes: TaskUpdate) -> Result<Task> {
    domain::update(store, id, |task: &mut Task| {
        if let Some(title) = changes.title {
            let title = title.trim();
            if title.is_empty() {
                bail!("Task title must not be empty");
            }
            task.title = title.to_string();
        }
        if let Some(description) = changes.description {
            task.description = Some(description.trim().to_string()).filter(|text| !text.is_empty());
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(date) = changes.date {
            task.date = date;
        }
        Ok(())
    })
}

pub fn delete_task(store: &Store, id: &str) -> Result<Task> {
    domain::delete(store, id)
}

/// Inputs for the morning task generation, captured from the store so the
/// model call can run without holding it.
#[derive(Debug, Clone)]
pub struct MorningPrep {
    pub date: NaiveDate,
    goals: Vec<TopicRef>,
    habits: Vec<TopicRef>,
    previous_day: Option<PreviousDay>,
}

impl MorningPrep {
    pub fn prepare(store: &Store, date: NaiveDate, mood: Option<String>) -> Result<Self> {
        let goals = list_goals(store)?
            .into_iter()
            .map(|goal| TopicRef {
                title: goal.title,
                category: goal.category.to_string(),
            })
            .collect();
        let habits = list_habits(store)?
            .into_iter()
            .map(|habit| TopicRef {
                title: habit.title,
                category: habit.category.to_string(),
            })
            .collect();

        let yesterday = tasks_for_date(store, date - Duration::days(1))?;
        let previous_day = (!yesterday.is_empty()).then(|| PreviousDay {
            completed_tasks: yesterday.iter().filter(|task| task.completed).count(),
            total_tasks: yesterday.len(),
            mood,
        });

        Ok(Self {
            date,
            goals,
            habits,
            previous_day,
        })
    }

    pub fn generate(&self, model: &dyn LanguageModel) -> Vec<TaskDraft> {
        ai::generate_morning_tasks(model, &self.goals, &self.habits, self.previous_day.as_ref())
    }

    pub fn run(self, store: &Store, model: &dyn LanguageModel) -> Result<Vec<Task>> {
        let drafts = self.generate(model);
        let tasks = add_tasks(store, drafts, self.date)?;
        info!(date = %self.date, count = tasks.len(), "morning prep tasks added");
        Ok(tasks)
    }
}
