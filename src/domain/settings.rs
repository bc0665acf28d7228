use crate::config::parse_hhmm;
use crate::db::{Store, StoreKey};
use anyhow::{Result, anyhow, bail};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notifications: bool,
    pub morning_prep_time: String,
    pub evening_reflection_time: String,
    pub privacy: PrivacySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacySettings {
    pub show_streak: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: true,
            morning_prep_time: "08:00".to_string(),
            evening_reflection_time: "21:00".to_string(),
            privacy: PrivacySettings::default(),
        }
    }
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self { show_streak: true }
    }
}

impl Settings {
    pub fn morning_prep(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.morning_prep_time)
    }

    pub fn evening_reflection(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.evening_reflection_time)
    }

    pub fn validate(&self) -> Result<()> {
        self.morning_prep()?;
        self.evening_reflection()?;
        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();

        match key {
            "notifications" => {
                self.notifications = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("notifications must be true/false"))?;
            }
            "morning_prep_time" | "morning.prep_time" => {
                parse_hhmm(value)?;
                self.morning_prep_time = value.to_string();
            }
            "evening_reflection_time" | "evening.reflection_time" => {
                parse_hhmm(value)?;
                self.evening_reflection_time = value.to_string();
            }
            "show_streak" | "privacy.show_streak" => {
                self.privacy.show_streak = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("privacy.show_streak must be true/false"))?;
            }
            _ => {
                bail!(
                    "Unsupported setting: {key}. Supported keys: notifications, morning_prep_time, evening_reflection_time, privacy.show_streak"
                );
            }
        }

        Ok(())
    }
}

pub fn get_settings(store: &Store) -> Result<Settings> {
    Ok(store.get(StoreKey::Settings)?.unwrap_or_default())
}

/// Replaces the stored settings as a whole.
pub fn save_settings(store: &Store, settings: &Settings) -> Result<()> {
    settings.validate()?;
    store.set(StoreKey::Settings, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_until_saved() {
        let store = Store::open_in_memory().expect("store");
        assert_eq!(get_settings(&store).expect("settings"), Settings::default());
    }

    #[test]
    fn saved_settings_are_read_back() {
        let store = Store::open_in_memory().expect("store");
        let mut settings = get_settings(&store).expect("settings");
        settings.set_value("morning_prep_time", "06:45").expect("time");
        settings.set_value("privacy.show_streak", "false").expect("privacy");
        save_settings(&store, &settings).expect("save");

        let loaded = get_settings(&store).expect("reload");
        assert_eq!(loaded.morning_prep_time, "06:45");
        assert!(!loaded.privacy.show_streak);
        assert!(loaded.notifications);
    }

    #[test]
    fn rejects_invalid_times() {
        let mut settings = Settings::default();
        assert!(settings.set_value("evening_reflection_time", "9pm").is_err());

        settings.morning_prep_time = "99:00".to_string();
        let store = Store::open_in_memory().expect("store");
        assert!(save_settings(&store, &settings).is_err());
    }
}
