//! The remote user service the cache is a client of.

pub mod http;

use async_trait::async_trait;

use crate::domain::{NewUser, User, UserId, UserPatch};
use crate::error::ServiceError;

pub use http::{HttpUserService, SimulatedLatency};

/// Operations the remote user service exposes.
#[async_trait]
pub trait UserService: Send + Sync {
    /// Fetch every known user.
    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;

    /// Register a user; the server assigns the id.
    async fn create_user(&self, new_user: NewUser) -> Result<User, ServiceError>;

    /// Apply a partial update to a persisted user.
    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, ServiceError>;
}
