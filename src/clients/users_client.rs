use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{EntryStatus, NewUser, User, UserId, UserPatch};
use crate::error::CacheError;
use crate::notifications::Notifier;
use crate::query_cache::{FetchStart, QueryClient, QueryKey, QueryState};
use crate::service::UserService;

pub const USERS_QUERY_KEY: QueryKey = "users";

pub type UsersQueryData = Vec<User>;

/// How a creation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The server accepted the user; this is its copy.
    Created(User),
    /// The call failed; this is the entry left in the cache, marked as error.
    Failed(User),
}

/// How an update ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(User),
    RolledBack,
    /// The target is not a persisted entry of the collection; nothing was
    /// written or sent.
    Skipped,
}

/// Client for the users collection.
///
/// Reads come from the shared query cache. Writes are applied to the cache
/// optimistically and then reconciled with what the remote service answers.
/// Service failures never surface as `Err`: they become cache state plus a
/// notification. Only a dead cache actor is reported as an error.
#[derive(Clone)]
pub struct UsersClient {
    cache: QueryClient<UsersQueryData>,
    service: Arc<dyn UserService>,
    notifier: Notifier,
}

impl UsersClient {
    pub fn new(
        cache: QueryClient<UsersQueryData>,
        service: Arc<dyn UserService>,
        notifier: Notifier,
    ) -> Self {
        Self {
            cache,
            service,
            notifier,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Loads the collection on first access.
    ///
    /// Once populated the collection is never re-fetched; afterwards only the
    /// mutations below change it.
    #[instrument(skip(self))]
    pub async fn use_users(&self) -> Result<QueryState<UsersQueryData>, CacheError> {
        match self.cache.begin_fetch(USERS_QUERY_KEY).await? {
            FetchStart::Cached(_) => debug!("Serving users from cache"),
            FetchStart::Joined => {
                debug!("Waiting for in-flight users fetch");
                let mut state = self.cache.subscribe(USERS_QUERY_KEY).await?;
                state
                    .wait_for(|state| !state.is_fetching)
                    .await
                    .map_err(|_| CacheError::ActorDropped)?;
            }
            FetchStart::Started(ticket) => {
                debug!("Fetching users");
                let result = match self.service.list_users().await {
                    Ok(users) => {
                        info!(count = users.len(), "Users loaded");
                        Ok(users)
                    }
                    Err(e) => {
                        error!(error = %e, "Listing users failed");
                        Err(e.to_string())
                    }
                };
                self.cache.finish_fetch(ticket, result).await?;
            }
        }
        self.cache.state(USERS_QUERY_KEY).await
    }

    /// The collection as currently cached, empty while loading.
    pub async fn users(&self) -> Result<UsersQueryData, CacheError> {
        Ok(self.cache.get(USERS_QUERY_KEY).await?.unwrap_or_default())
    }

    pub async fn watch_users(
        &self,
    ) -> Result<watch::Receiver<QueryState<UsersQueryData>>, CacheError> {
        self.cache.subscribe(USERS_QUERY_KEY).await
    }

    /// Registers a user, showing it as pending until the server answers.
    #[instrument(skip(self, new_user), fields(name = %new_user.name, username = %new_user.username))]
    pub async fn create_user(&self, new_user: NewUser) -> Result<CreateOutcome, CacheError> {
        let temp_id = UserId::temporary();
        let optimistic = User::pending(temp_id.clone(), &new_user);
        let failed = User {
            status: EntryStatus::Error,
            ..optimistic.clone()
        };

        self.cache
            .set(USERS_QUERY_KEY, move |old| {
                old.map(|mut users| {
                    users.push(optimistic);
                    users
                })
            })
            .await?;
        debug!(temp_id = %temp_id, "Inserted pending user");

        match self.service.create_user(new_user).await {
            Ok(mut created) => {
                created.status = EntryStatus::Persisted;
                self.cache.cancel_in_flight(USERS_QUERY_KEY).await?;
                let replacement = created.clone();
                self.cache
                    .set(USERS_QUERY_KEY, move |old| {
                        old.map(|users| replace_entry(users, &temp_id, replacement))
                    })
                    .await?;
                info!(user_id = %created.id, "User created");
                Ok(CreateOutcome::Created(created))
            }
            Err(e) => {
                error!(error = %e, temp_id = %temp_id, "User creation failed");
                self.cache.cancel_in_flight(USERS_QUERY_KEY).await?;
                self.cache
                    .set(USERS_QUERY_KEY, move |old| {
                        old.map(|users| mark_failed(users, &temp_id))
                    })
                    .await?;
                self.notifier.error("Error creating user!");
                Ok(CreateOutcome::Failed(failed))
            }
        }
    }

    /// Drops a failed entry and submits the same user again, unblocked.
    #[instrument(skip(self, failed), fields(user_id = %failed.id))]
    pub async fn retry_create(&self, failed: &User) -> Result<CreateOutcome, CacheError> {
        let id = failed.id.clone();
        self.cache
            .set(USERS_QUERY_KEY, move |old| {
                old.map(|users| remove_entry(users, &id))
            })
            .await?;
        debug!("Removed failed entry, creating again");

        self.create_user(NewUser::new(failed.name.clone(), failed.username.clone(), false))
            .await
    }

    /// Patches a persisted user optimistically, restoring its previous entry
    /// if the server rejects the change.
    ///
    /// Pending and failed rows have no server id yet and are skipped, as are
    /// ids the collection does not hold.
    #[instrument(skip(self, id), fields(user_id = %id))]
    pub async fn update_user(
        &self,
        id: UserId,
        patch: UserPatch,
    ) -> Result<UpdateOutcome, CacheError> {
        if id.is_temporary() {
            warn!("Not updating an entry that is still being created");
            return Ok(UpdateOutcome::Skipped);
        }

        let target = id.clone();
        let optimistic = patch.clone();
        let snapshot = self
            .cache
            .set(USERS_QUERY_KEY, move |old| {
                old.map(|users| patch_entry(users, &target, &optimistic))
            })
            .await?;
        let previous = match find_persisted(snapshot, &id) {
            Some(previous) => previous,
            None => {
                warn!("No persisted user with this id, skipping update");
                return Ok(UpdateOutcome::Skipped);
            }
        };

        match self.service.update_user(id.clone(), patch).await {
            Ok(user) => {
                info!("User updated");
                Ok(UpdateOutcome::Applied(user))
            }
            Err(e) => {
                warn!(error = %e, "User update failed, rolling back");
                self.cache.cancel_in_flight(USERS_QUERY_KEY).await?;
                self.cache
                    .set(USERS_QUERY_KEY, move |old| {
                        old.map(|users| replace_entry(users, &id, previous))
                    })
                    .await?;
                self.notifier.error("Error updating user!");
                Ok(UpdateOutcome::RolledBack)
            }
        }
    }

    pub async fn set_blocked(
        &self,
        id: UserId,
        blocked: bool,
    ) -> Result<UpdateOutcome, CacheError> {
        self.update_user(id, UserPatch::blocked(blocked)).await
    }
}

fn replace_entry(users: UsersQueryData, id: &UserId, replacement: User) -> UsersQueryData {
    users
        .into_iter()
        .map(|user| {
            if user.id == *id {
                replacement.clone()
            } else {
                user
            }
        })
        .collect()
}

fn mark_failed(users: UsersQueryData, id: &UserId) -> UsersQueryData {
    users
        .into_iter()
        .map(|user| {
            if user.id == *id {
                User {
                    status: EntryStatus::Error,
                    ..user
                }
            } else {
                user
            }
        })
        .collect()
}

fn remove_entry(users: UsersQueryData, id: &UserId) -> UsersQueryData {
    users.into_iter().filter(|user| user.id != *id).collect()
}

/// Patches the entry with `id` if it is persisted; other rows are left alone.
fn patch_entry(users: UsersQueryData, id: &UserId, patch: &UserPatch) -> UsersQueryData {
    users
        .into_iter()
        .map(|user| {
            if user.id == *id && user.status.is_persisted() {
                user.patched(patch)
            } else {
                user
            }
        })
        .collect()
}

fn find_persisted(users: Option<UsersQueryData>, id: &UserId) -> Option<User> {
    users?
        .into_iter()
        .find(|user| user.id == *id && user.status.is_persisted())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> UsersQueryData {
        vec![
            User::new("1", "A", "a", false),
            User::pending(UserId::new("tmp-x"), &NewUser::new("B", "b", false)),
            User::new("3", "C", "c", true),
        ]
    }

    #[test]
    fn replace_keeps_position() {
        let users = replace_entry(
            collection(),
            &UserId::new("tmp-x"),
            User::new("2", "B", "b", false),
        );
        let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(users.iter().all(|u| u.status == EntryStatus::Persisted));
    }

    #[test]
    fn mark_failed_touches_only_target() {
        let before = collection();
        let after = mark_failed(before.clone(), &UserId::new("tmp-x"));
        assert_eq!(after[1].status, EntryStatus::Error);
        assert_eq!(after[1].name, "B");
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
    }

    #[test]
    fn remove_and_patch() {
        let users = remove_entry(collection(), &UserId::new("tmp-x"));
        assert_eq!(users.len(), 2);

        let users = patch_entry(users, &UserId::new("3"), &UserPatch::blocked(false));
        assert!(!users[1].blocked);
        assert_eq!(users[0], User::new("1", "A", "a", false));
    }

    #[test]
    fn patch_and_lookup_ignore_unpersisted_rows() {
        let pending = UserId::new("tmp-x");
        let users = patch_entry(collection(), &pending, &UserPatch::blocked(true));
        assert_eq!(users, collection());

        assert_eq!(find_persisted(Some(collection()), &pending), None);
        assert_eq!(find_persisted(None, &UserId::new("1")), None);
        assert_eq!(
            find_persisted(Some(collection()), &UserId::new("3")),
            Some(User::new("3", "C", "c", true))
        );
    }
}
