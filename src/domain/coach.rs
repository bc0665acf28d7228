use crate::ai::{self, CoachContext, LanguageModel};
use crate::db::{Store, StoreKey};
use crate::domain::goals::list_goals;
use crate::domain::habits::list_habits;
use crate::domain::{self, Record};
use anyhow::{Result, bail};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.with_timezone(&Local).date_naive()
    }
}

impl Record for ChatMessage {
    const KEY: StoreKey = StoreKey::ChatMessages;
    const NAME: &'static str = "Chat message";

    fn id(&self) -> &str {
        &self.id
    }
}

pub fn chat_history(store: &Store) -> Result<Vec<ChatMessage>> {
    domain::all(store)
}

pub fn messages_on(store: &Store, date: NaiveDate) -> Result<Vec<ChatMessage>> {
    Ok(chat_history(store)?
        .into_iter()
        .filter(|message| message.local_date() == date)
        .collect())
}

pub fn add_chat_message(store: &Store, role: ChatRole, content: &str) -> Result<ChatMessage> {
    domain::insert(
        store,
        ChatMessage {
            id: domain::new_id(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        },
    )
}

/// A coach exchange whose user message is already persisted.
#[derive(Debug, Clone)]
pub struct CoachTurn {
    pub user_message: ChatMessage,
    history: Vec<ChatMessage>,
    context: CoachContext,
}

impl CoachTurn {
    pub fn begin(store: &Store, text: &str, mood: Option<String>) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            bail!("Message must not be empty");
        }

        let history = chat_history(store)?;
        let context = CoachContext {
            goals: list_goals(store)?.into_iter().map(|goal| goal.title).collect(),
            habits: list_habits(store)?
                .into_iter()
                .map(|habit| habit.title)
                .collect(),
            recent_mood: mood,
        };
        let user_message = add_chat_message(store, ChatRole::User, text)?;

        Ok(Self {
            user_message,
            history,
            context,
        })
    }

    pub fn ask(&self, model: &dyn LanguageModel) -> Result<String> {
        ai::send_message(model, &self.user_message.content, &self.history, &self.context)
    }

    pub fn finish(self, store: &Store, reply: &str) -> Result<ChatMessage> {
        let message = add_chat_message(store, ChatRole::Assistant, reply)?;
        info!(turns = self.history.len() + 2, "coach reply stored");
        Ok(message)
    }
}

/// Stores the user's message, asks the coach, stores the reply. On failure
/// the user's message stays in the history.
pub fn send_to_coach(
    store: &Store,
    model: &dyn LanguageModel,
    text: &str,
    mood: Option<String>,
) -> Result<ChatMessage> {
    let turn = CoachTurn::begin(store, text, mood)?;
    let reply = turn.ask(model)?;
    turn.finish(store, &reply)
}
