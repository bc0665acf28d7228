use crate::db::{Store, StoreKey};
use crate::domain::{self, Record};
use anyhow::{Result, anyhow, bail};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

impl Record for User {
    const KEY: StoreKey = StoreKey::Users;
    const NAME: &'static str = "User";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A user without credentials, safe to print or return over the API.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {MIN_PASSWORD_LEN} characters");
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, host)| !local.is_empty() && !host.is_empty());
    if !valid {
        bail!("Invalid email address: {email}");
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

pub fn list_users(store: &Store) -> Result<Vec<User>> {
    domain::all(store)
}

pub fn create_user(store: &Store, name: &str, email: &str, password: &str) -> Result<User> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Name must not be empty");
    }
    let email = normalize_email(email);
    validate_email(&email)?;
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let user = store.update_list(StoreKey::Users, |users: &mut Vec<User>| {
        if users.iter().any(|user| user.email == email) {
            bail!("An account with this email already exists: {email}");
        }
        let user = User {
            id: domain::new_id(),
            name: name.to_string(),
            email: email.clone(),
            password_hash,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    })?;

    info!(user = %user.id, "user created");
    Ok(user)
}

/// Matching user for the credentials, if any. Never writes.
pub fn find_by_credentials(store: &Store, email: &str, password: &str) -> Result<Option<User>> {
    let email = normalize_email(email);
    let Some(user) = list_users(store)?.into_iter().find(|user| user.email == email) else {
        return Ok(None);
    };

    Ok(verify_password(password, &user.password_hash)?.then_some(user))
}

pub fn update_user(store: &Store, id: &str, changes: UserUpdate) -> Result<User> {
    let email = changes.email.as_deref().map(normalize_email);
    if let Some(email) = &email {
        validate_email(email)?;
    }
    let password_hash = changes
        .password
        .as_deref()
        .map(|password| validate_password(password).and_then(|_| hash_password(password)))
        .transpose()?;
    let name = changes.name;

    store.update_list(StoreKey::Users, |users: &mut Vec<User>| {
        if let Some(email) = &email {
            if users.iter().any(|user| user.id != id && &user.email == email) {
                bail!("An account with this email already exists: {email}");
            }
        }

        let Some(user) = users.iter_mut().find(|user| user.id == id) else {
            bail!("User not found: {id}");
        };
        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                bail!("Name must not be empty");
            }
            user.name = name.to_string();
        }
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(password_hash) = password_hash {
            user.password_hash = password_hash;
        }
        Ok(user.clone())
    })
}

pub fn current_user(store: &Store) -> Result<Option<User>> {
    let Some(id) = store.get::<String>(StoreKey::CurrentUser)? else {
        return Ok(None);
    };

    Ok(list_users(store)?.into_iter().find(|user| user.id == id))
}

pub fn set_current_user(store: &Store, user: &User) -> Result<()> {
    store.set(StoreKey::CurrentUser, &user.id)
}

pub fn clear_current_user(store: &Store) -> Result<()> {
    store.remove(StoreKey::CurrentUser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("correct-horse").expect("hash");
        assert!(verify_password("correct-horse", &hash).expect("verify"));
        assert!(!verify_password("wrong-horse", &hash).expect("verify"));
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }

    #[test]
    fn emails_are_unique_ignoring_case() {
        let store = Store::open_in_memory().expect("store");
        create_user(&store, "Ana", "ana@x.com", "secret1").expect("first");
        assert!(create_user(&store, "Other", " ANA@x.com ", "secret2").is_err());
        assert_eq!(list_users(&store).expect("users").len(), 1);
    }

    #[test]
    fn short_passwords_are_rejected() {
        let store = Store::open_in_memory().expect("store");
        assert!(create_user(&store, "Ana", "ana@x.com", "12345").is_err());
        assert!(list_users(&store).expect("users").is_empty());
    }

    #[test]
    fn password_is_never_stored_in_plain_text() {
        let store = Store::open_in_memory().expect("store");
        let user = create_user(&store, "Ana", "ana@x.com", "secret1").expect("create");
        assert_ne!(user.password_hash, "secret1");

        let profile = serde_json::to_value(user.profile()).expect("json");
        assert!(profile.get("password_hash").is_none());
    }

    #[test]
    fn credentials_lookup() {
        let store = Store::open_in_memory().expect("store");
        let user = create_user(&store, "Ana", "ana@x.com", "secret1").expect("create");

        let found = find_by_credentials(&store, "Ana@X.com", "secret1").expect("lookup");
        assert_eq!(found.map(|found| found.id), Some(user.id));
        assert!(find_by_credentials(&store, "ana@x.com", "nope!!").expect("lookup").is_none());
        assert!(find_by_credentials(&store, "bob@x.com", "secret1").expect("lookup").is_none());
    }

    #[test]
    fn update_rejects_taken_email() {
        let store = Store::open_in_memory().expect("store");
        create_user(&store, "Ana", "ana@x.com", "secret1").expect("ana");
        let bob = create_user(&store, "Bob", "bob@x.com", "secret1").expect("bob");

        let changes = UserUpdate {
            email: Some("ana@x.com".to_string()),
            ..UserUpdate::default()
        };
        assert!(update_user(&store, &bob.id, changes).is_err());

        let renamed = update_user(
            &store,
            &bob.id,
            UserUpdate {
                name: Some("Robert".to_string()),
                ..UserUpdate::default()
            },
        )
        .expect("rename");
        assert_eq!(renamed.name, "Robert");
        assert_eq!(renamed.email, "bob@x.com");
    }
}
