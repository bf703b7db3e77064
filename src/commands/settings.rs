use crate::config::SETTING_SOURCES;
use crate::db::{Database, StoreError};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn ensure_known(key: &str) -> Result<(), SettingsError> {
    if SETTING_SOURCES.iter().any(|(k, _)| *k == key) {
        Ok(())
    } else {
        Err(SettingsError::UnknownKey(key.to_string()))
    }
}

/// Stored settings, API keys masked for display.
pub fn get_settings(db: &Database) -> Result<BTreeMap<String, String>, SettingsError> {
    let mut map = BTreeMap::new();
    for (key, _) in SETTING_SOURCES {
        if let Some(value) = db.get_setting(key)? {
            if key.ends_with("_api_key") {
                map.insert(key.to_string(), mask_secret(&value));
            } else {
                map.insert(key.to_string(), value);
            }
        }
    }
    Ok(map)
}

pub fn set_setting(db: &Database, key: &str, value: &str) -> Result<(), SettingsError> {
    ensure_known(key)?;
    db.set_setting(key, value)?;
    Ok(())
}

pub fn delete_setting(db: &Database, key: &str) -> Result<(), SettingsError> {
    ensure_known(key)?;
    db.delete_setting(key)?;
    Ok(())
}

fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
