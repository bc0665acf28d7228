use crate::ai::{self, LanguageModel};
use crate::db::{Store, StoreKey};
use crate::domain::coach::{ChatMessage, messages_on};
use crate::domain::habits::list_habits;
use crate::domain::tasks::tasks_for_date;
use crate::domain::{self, Record};
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub date: NaiveDate,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Record for JournalEntry {
    const KEY: StoreKey = StoreKey::JournalEntries;
    const NAME: &'static str = "Journal entry";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Answers given during the evening reflection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(default)]
    pub wins: Vec<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
    pub mood: String,
    #[serde(default)]
    pub lessons_learned: String,
}

pub fn list_journal_entries(store: &Store) -> Result<Vec<JournalEntry>> {
    domain::all(store)
}

pub fn entries_on(store: &Store, date: NaiveDate) -> Result<Vec<JournalEntry>> {
    Ok(list_journal_entries(store)?
        .into_iter()
        .filter(|entry| entry.date == date)
        .collect())
}

pub fn add_journal_entry(store: &Store, date: NaiveDate, content: &str) -> Result<JournalEntry> {
    let content = content.trim();
    if content.is_empty() {
        bail!("Journal entry must not be empty");
    }

    domain::insert(
        store,
        JournalEntry {
            id: domain::new_id(),
            date,
            content: content.to_string(),
            created_at: Utc::now(),
        },
    )
}

pub fn delete_journal_entry(store: &Store, id: &str) -> Result<JournalEntry> {
    domain::delete(store, id)
}

pub fn reflection_prompts(
    store: &Store,
    model: &dyn LanguageModel,
    mood: &str,
    date: NaiveDate,
) -> Result<Vec<String>> {
    let tasks_completed = tasks_for_date(store, date)?
        .iter()
        .filter(|task| task.completed)
        .count();
    let habits = list_habits(store)?
        .into_iter()
        .map(|habit| habit.title)
        .collect::<Vec<_>>();

    Ok(ai::generate_reflection_prompts(
        model,
        mood,
        tasks_completed,
        &habits,
    ))
}

/// The day's conversations, tasks and reflection answers, ready to be
/// written up as a journal entry.
#[derive(Debug, Clone)]
pub struct EveningReflection {
    pub date: NaiveDate,
    reflection: Reflection,
    chat: Vec<ChatMessage>,
    tasks: Option<(usize, usize)>,
}

impl EveningReflection {
    pub fn prepare(store: &Store, date: NaiveDate, reflection: Reflection) -> Result<Self> {
        let tasks = tasks_for_date(store, date)?;
        let completed = tasks.iter().filter(|task| task.completed).count();

        Ok(Self {
            date,
            reflection,
            chat: messages_on(store, date)?,
            tasks: (!tasks.is_empty()).then_some((completed, tasks.len())),
        })
    }

    pub fn write(&self, model: &dyn LanguageModel) -> String {
        ai::generate_journal_entry(model, &self.chat, Some(&self.reflection), self.tasks)
    }

    pub fn save(&self, store: &Store, content: &str) -> Result<JournalEntry> {
        let entry = add_journal_entry(store, self.date, content)?;
        info!(date = %self.date, entry = %entry.id, "journal entry saved");
        Ok(entry)
    }

    pub fn run(self, store: &Store, model: &dyn LanguageModel) -> Result<JournalEntry> {
        let content = self.write(model);
        self.save(store, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{FailingModel, ScriptedModel};
    use crate::ai::{DEFAULT_REFLECTION_PROMPTS, JOURNAL_FAILURE_FALLBACK};
    use crate::domain::coach::{ChatRole, add_chat_message};

    fn domain_test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).expect("date")
    }

    fn reflection() -> Reflection {
        Reflection {
            wins: vec!["Went for a run".to_string()],
            challenges: Vec::new(),
            mood: "content".to_string(),
            lessons_learned: "Rest matters".to_string(),
        }
    }

    #[test]
    fn evening_reflection_becomes_a_journal_entry() {
        let store = Store::open_in_memory().expect("store");
        let today = domain::today();
        add_chat_message(&store, ChatRole::User, "I ran this morning").expect("chat");

        let model = ScriptedModel::new("Today I ran and felt strong.");
        let entry = EveningReflection::prepare(&store, today, reflection())
            .expect("prepare")
            .run(&store, &model)
            .expect("run");

        assert_eq!(entry.date, today);
        assert_eq!(entry.content, "Today I ran and felt strong.");
        let prompt = model.last_prompt();
        assert!(prompt.contains("user: I ran this morning"));
        assert!(prompt.contains("- Wins: Went for a run"));
        assert!(prompt.contains("- Challenges: None noted"));
        assert_eq!(entries_on(&store, today).expect("entries").len(), 1);
    }

    #[test]
    fn failed_generation_still_saves_the_fallback_entry() {
        let store = Store::open_in_memory().expect("store");
        let date = domain_test_date();
        let entry = EveningReflection::prepare(&store, date, reflection())
            .expect("prepare")
            .run(&store, &FailingModel)
            .expect("run");

        assert_eq!(entry.content, JOURNAL_FAILURE_FALLBACK);
    }

    #[test]
    fn prompts_fall_back_to_defaults() {
        let store = Store::open_in_memory().expect("store");
        let prompts =
            reflection_prompts(&store, &FailingModel, "tired", domain_test_date()).expect("prompts");
        assert_eq!(prompts, DEFAULT_REFLECTION_PROMPTS.map(str::to_string).to_vec());
    }
}
