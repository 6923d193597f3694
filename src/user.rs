//! Cached summary of the signed-in user.
//!
//! Authentication itself happens elsewhere; this only mirrors who is
//! signed in so the quota policy and UI can react to it.

use crate::error::Result;
use crate::storage::{LocalStore, COMPRESSION_COUNT_KEY, USER_KEY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserSummary {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
}

pub fn current_user(store: &LocalStore) -> Option<UserSummary> {
    store
        .get_item(USER_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
}

/// Remember the user and drop the anonymous usage counter
pub fn sign_in(store: &LocalStore, user: &UserSummary) -> Result<()> {
    store.set_item(USER_KEY, &serde_json::to_string(user)?)?;
    store.remove_item(COMPRESSION_COUNT_KEY)
}

pub fn sign_out(store: &LocalStore) -> Result<()> {
    store.remove_item(USER_KEY)
}
