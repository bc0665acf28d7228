pub mod achievements;
pub mod coach;
pub mod goals;
pub mod habits;
pub mod journal;
pub mod onboarding;
pub mod settings;
pub mod summary;
pub mod tasks;
pub mod users;

use crate::db::{Store, StoreKey};
use anyhow::{Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// An entity persisted as one element of a store collection.
pub trait Record: Serialize + DeserializeOwned + Clone {
    const KEY: StoreKey;
    const NAME: &'static str;

    fn id(&self) -> &str;
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn all<T: Record>(store: &Store) -> Result<Vec<T>> {
    store.list(T::KEY)
}

pub fn insert<T: Record>(store: &Store, record: T) -> Result<T> {
    store.update_list(T::KEY, |items: &mut Vec<T>| {
        items.push(record.clone());
        Ok(record)
    })
}

pub fn update<T, F>(store: &Store, id: &str, apply: F) -> Result<T>
where
    T: Record,
    F: FnOnce(&mut T) -> Result<()>,
{
    store.update_list(T::KEY, |items: &mut Vec<T>| {
        let Some(item) = items.iter_mut().find(|item| item.id() == id) else {
            bail!("{} not found: {id}", T::NAME);
        };
        apply(item)?;
        Ok(item.clone())
    })
}

pub fn delete<T: Record>(store: &Store, id: &str) -> Result<T> {
    store.update_list(T::KEY, |items: &mut Vec<T>| {
        let Some(position) = items.iter().position(|item| item.id() == id) else {
            bail!("{} not found: {id}", T::NAME);
        };
        Ok(items.remove(position))
    })
}

/// Resolves a full id or a unique id prefix, as typed on the command line.
pub fn resolve_id<T: Record>(store: &Store, needle: &str) -> Result<String> {
    let needle = needle.trim();
    let items = all::<T>(store)?;

    if let Some(exact) = items.iter().find(|item| item.id() == needle) {
        return Ok(exact.id().to_string());
    }

    let matches = items
        .iter()
        .filter(|item| !needle.is_empty() && item.id().starts_with(needle))
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [single] => Ok(single.id().to_string()),
        [] => bail!("{} not found: {needle}", T::NAME),
        _ => bail!(
            "Ambiguous {} id prefix: {needle} ({} matches)",
            T::NAME,
            matches.len()
        ),
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::goals::{Goal, GoalCategory, NewGoal, add_goal};
    use super::{delete, resolve_id, update};
    use crate::db::Store;

    #[test]
    fn resolves_unique_prefix() {
        let store = Store::open_in_memory().expect("store");
        let goal = add_goal(
            &store,
            NewGoal {
                title: "Read more".to_string(),
                description: String::new(),
                category: GoalCategory::Personal,
            },
        )
        .expect("goal");

        let resolved = resolve_id::<Goal>(&store, &goal.id[..6]).expect("resolve");
        assert_eq!(resolved, goal.id);
        assert!(resolve_id::<Goal>(&store, "zzzz").is_err());
    }

    #[test]
    fn unknown_ids_are_errors() {
        let store = Store::open_in_memory().expect("store");
        assert!(delete::<Goal>(&store, "missing").is_err());
        assert!(update::<Goal, _>(&store, "missing", |_| Ok(())).is_err());
    }
}
