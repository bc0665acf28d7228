pub mod queries;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Logical namespaces of the key-value document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    Users,
    CurrentUser,
    Habits,
    Tasks,
    Goals,
    ChatMessages,
    JournalEntries,
    Settings,
    Achievements,
    OnboardingComplete,
}

impl StoreKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::Users => "users",
            StoreKey::CurrentUser => "current_user",
            StoreKey::Habits => "habits",
            StoreKey::Tasks => "tasks",
            StoreKey::Goals => "goals",
            StoreKey::ChatMessages => "chat_messages",
            StoreKey::JournalEntries => "journal_entries",
            StoreKey::Settings => "settings",
            StoreKey::Achievements => "achievements",
            StoreKey::OnboardingComplete => "onboarding_complete",
        }
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let store = Self { conn };
        store.init_schema()?;

        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite DB")?;

        let store = Self { conn };
        store.init_schema()?;

        Ok(store)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(queries::SELECT_VALUE, params![key.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read store key: {}", key.as_str()))?;

        raw.map(|content| {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store value: {}", key.as_str()))
        })
        .transpose()
    }

    pub fn set<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<()> {
        write_value(&self.conn, key, value)
    }

    pub fn remove(&self, key: StoreKey) -> Result<()> {
        self.conn
            .execute(queries::DELETE_VALUE, params![key.as_str()])
            .with_context(|| format!("Failed to remove store key: {}", key.as_str()))?;

        Ok(())
    }

    /// Reads a collection; an absent key is an empty collection.
    pub fn list<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Vec<T>> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    /// Read-modify-write of one collection inside a single transaction.
    /// Nothing is written when `apply` fails.
    pub fn update_list<T, R, F>(&self, key: StoreKey, apply: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> Result<R>,
    {
        let transaction = self
            .conn
            .unchecked_transaction()
            .context("Failed to start transaction")?;

        let raw: Option<String> = transaction
            .query_row(queries::SELECT_VALUE, params![key.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read store key: {}", key.as_str()))?;

        let mut items: Vec<T> = match raw {
            Some(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store value: {}", key.as_str()))?,
            None => Vec::new(),
        };

        let result = apply(&mut items)?;
        write_value(&transaction, key, &items)?;

        transaction
            .commit()
            .with_context(|| format!("Failed to commit store key: {}", key.as_str()))?;

        Ok(result)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut statement = self.conn.prepare(queries::SELECT_KEYS)?;

        let keys = statement
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to list store keys")?;

        Ok(keys)
    }
}

fn write_value<T: Serialize>(conn: &Connection, key: StoreKey, value: &T) -> Result<()> {
    let content = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize store value: {}", key.as_str()))?;

    conn.execute(
        queries::UPSERT_VALUE,
        params![key.as_str(), content, Utc::now().timestamp()],
    )
    .with_context(|| format!("Failed to write store key: {}", key.as_str()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Store, StoreKey};
    use anyhow::anyhow;

    #[test]
    fn persists_values_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db").join("justly.db");

        {
            let store = Store::open(&path).expect("open store");
            store
                .set(StoreKey::OnboardingComplete, &true)
                .expect("write flag");
        }

        let store = Store::open(&path).expect("reopen store");
        let flag: Option<bool> = store.get(StoreKey::OnboardingComplete).expect("read flag");
        assert_eq!(flag, Some(true));
        assert_eq!(store.keys().expect("keys"), vec!["onboarding_complete"]);
    }

    #[test]
    fn missing_collection_reads_as_empty() {
        let store = Store::open_in_memory().expect("store");
        let items: Vec<String> = store.list(StoreKey::Tasks).expect("list");
        assert!(items.is_empty());
    }

    #[test]
    fn failed_update_leaves_collection_untouched() {
        let store = Store::open_in_memory().expect("store");
        store
            .set(StoreKey::Goals, &vec!["keep".to_string()])
            .expect("seed");

        let result = store.update_list(StoreKey::Goals, |items: &mut Vec<String>| {
            items.clear();
            Err::<(), _>(anyhow!("abort"))
        });
        assert!(result.is_err());

        let items: Vec<String> = store.list(StoreKey::Goals).expect("list");
        assert_eq!(items, vec!["keep".to_string()]);
    }

    #[test]
    fn remove_deletes_key() {
        let store = Store::open_in_memory().expect("store");
        store.set(StoreKey::CurrentUser, &"someone").expect("set");
        store.remove(StoreKey::CurrentUser).expect("remove");

        let value: Option<String> = store.get(StoreKey::CurrentUser).expect("get");
        assert!(value.is_none());
    }
}
