use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TEMPORARY_PREFIX: &str = "tmp-";

/// Opaque user identifier.
///
/// Persisted users carry the id the server assigned. Entries that are still
/// waiting for the server carry a client-generated temporary id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh temporary id for an optimistic entry.
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Where a client-held entry stands relative to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Confirmed by the server.
    #[default]
    Persisted,
    /// Optimistically inserted, creation still in flight.
    Pending,
    /// Creation failed; kept so it can be retried.
    Error,
}

impl EntryStatus {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted)
    }
}

/// Represents a registered user as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "EntryStatus::is_persisted")]
    pub status: EntryStatus,
}

/// Payload for registering a new user. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub blocked: bool,
}

/// Partial update for an existing user. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

impl User {
    /// Creates a persisted user.
    pub fn new(
        id: impl Into<UserId>,
        name: impl Into<String>,
        username: impl Into<String>,
        blocked: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            username: username.into(),
            blocked,
            status: EntryStatus::Persisted,
        }
    }

    /// Builds the optimistic entry shown while `new_user` is being created.
    pub fn pending(id: UserId, new_user: &NewUser) -> Self {
        Self {
            id,
            name: new_user.name.clone(),
            username: new_user.username.clone(),
            blocked: new_user.blocked,
            status: EntryStatus::Pending,
        }
    }

    /// Returns a copy with the patch fields laid over this user.
    pub fn patched(&self, patch: &UserPatch) -> Self {
        let mut user = self.clone();
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(username) = &patch.username {
            user.username = username.clone();
        }
        if let Some(blocked) = patch.blocked {
            user.blocked = blocked;
        }
        user
    }

    pub fn avatar_url(&self) -> String {
        format!("https://github.com/{}.png", self.username)
    }

    /// First letter of every word in the display name, uppercased.
    pub fn initials(&self) -> String {
        self.name
            .split(' ')
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

impl NewUser {
    pub fn new(name: impl Into<String>, username: impl Into<String>, blocked: bool) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            blocked,
        }
    }
}

impl UserPatch {
    pub fn blocked(blocked: bool) -> Self {
        Self {
            blocked: Some(blocked),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_payload_without_status_is_persisted() {
        let user: User =
            serde_json::from_str(r#"{"id":"1","name":"A","username":"a","blocked":false}"#)
                .unwrap();
        assert_eq!(user.status, EntryStatus::Persisted);
        assert_eq!(user, User::new("1", "A", "a", false));
    }

    #[test]
    fn persisted_status_is_not_serialized() {
        let json = serde_json::to_value(User::new("1", "A", "a", false)).unwrap();
        assert!(json.get("status").is_none());

        let pending = User::pending(UserId::temporary(), &NewUser::new("B", "b", false));
        let json = serde_json::to_value(pending).unwrap();
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn patch_overwrites_only_present_fields() {
        let user = User::new("1", "Ada Lovelace", "ada", false);
        let patched = user.patched(&UserPatch::blocked(true));
        assert!(patched.blocked);
        assert_eq!(patched.name, "Ada Lovelace");
        assert_eq!(patched.id, user.id);

        let json = serde_json::to_value(UserPatch::blocked(true)).unwrap();
        assert_eq!(json, serde_json::json!({ "blocked": true }));
    }

    #[test]
    fn temporary_ids_are_distinct() {
        let a = UserId::temporary();
        let b = UserId::temporary();
        assert_ne!(a, b);
        assert!(a.is_temporary());
        assert!(!UserId::new("42").is_temporary());
    }

    #[test]
    fn derived_display_fields() {
        let user = User::new("1", "ada lovelace", "ada", false);
        assert_eq!(user.initials(), "AL");
        assert_eq!(user.avatar_url(), "https://github.com/ada.png");
    }
}
