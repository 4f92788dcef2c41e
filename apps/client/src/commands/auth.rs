//! Sign-in commands. The backend decides who the user is; the device only
//! remembers the signed-in account.

use crate::db::SettingsRepository;
use crate::state::AppState;
use edurural_core::types::{User, UserRole};

use super::CommandError;

pub const CURRENT_USER_KEY: &str = "current_user";

pub async fn login(
    email: &str,
    password: &str,
    role: UserRole,
    state: &AppState,
) -> Result<User, CommandError> {
    let user = state.remote.login(email, password, role).await?;
    remember(&user, state)?;
    tracing::info!(uid = %user.uid, role = ?user.role, "signed in");
    Ok(user)
}

pub async fn signup(
    email: &str,
    password: &str,
    name: &str,
    role: UserRole,
    state: &AppState,
) -> Result<User, CommandError> {
    if name.trim().is_empty() {
        return Err(CommandError::new("Name cannot be empty"));
    }
    let user = state.remote.signup(email, password, name, role).await?;
    remember(&user, state)?;
    tracing::info!(uid = %user.uid, role = ?user.role, "account created");
    Ok(user)
}

pub fn logout(state: &AppState) -> Result<(), CommandError> {
    let repo = state.repo()?;
    repo.delete_setting(CURRENT_USER_KEY).map_err(Into::into)
}

/// Account remembered from the last sign-in, if any.
pub fn current_user(state: &AppState) -> Result<Option<User>, CommandError> {
    let repo = state.repo()?;
    match repo.get_setting(CURRENT_USER_KEY)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

fn remember(user: &User, state: &AppState) -> Result<(), CommandError> {
    let value = serde_json::to_value(user)?;
    let repo = state.repo()?;
    repo.put_setting(CURRENT_USER_KEY, &value).map_err(Into::into)
}
