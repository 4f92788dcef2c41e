//! Settings commands.

use crate::db::SettingsRepository;
use crate::state::AppState;

use super::CommandError;

pub const LANGUAGE_KEY: &str = "language";
pub const DEFAULT_LANGUAGE: &str = "en";

pub fn get_setting(key: &str, state: &AppState) -> Result<Option<serde_json::Value>, CommandError> {
    let repo = state.repo()?;
    repo.get_setting(key).map_err(Into::into)
}

pub fn save_setting(
    key: &str,
    value: serde_json::Value,
    state: &AppState,
) -> Result<(), CommandError> {
    if key.trim().is_empty() {
        return Err(CommandError::new("Setting key cannot be empty"));
    }
    let repo = state.repo()?;
    repo.put_setting(key, &value).map_err(Into::into)
}

/// Preferred UI language, `en` when never set.
pub fn get_language(state: &AppState) -> Result<String, CommandError> {
    let repo = state.repo()?;
    let language = repo
        .get_setting(LANGUAGE_KEY)?
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    Ok(language)
}

pub fn set_language(language: &str, state: &AppState) -> Result<(), CommandError> {
    let language = language.trim();
    if language.is_empty() {
        return Err(CommandError::new("Language cannot be empty"));
    }
    let repo = state.repo()?;
    repo.put_setting(LANGUAGE_KEY, &serde_json::Value::from(language))
        .map_err(Into::into)
}
