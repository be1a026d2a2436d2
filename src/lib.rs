//! # theusers
//!
//! A user-management client over a REST API with optimistic updates.
//!
//! ## Pieces
//!
//! - **Domain types** - [`domain::User`], [`domain::NewUser`], [`domain::UserPatch`]
//! - **Query cache** - an actor holding the last known value per key, with
//!   cancellable fetches → [`query_cache::QueryCacheActor`], [`query_cache::QueryClient`]
//! - **Remote service** - the REST endpoints behind a trait → [`service::UserService`]
//! - **Users client** - list query plus create/update mutations that write to the
//!   cache first and reconcile afterwards → [`clients::UsersClient`]
//! - **System coordinator** - startup, config, tracing, shutdown → [`app_system::UsersSystem`]
//!
//! ## Example Usage
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use theusers::app_system::{AppConfig, UsersSystem};
//! use theusers::domain::NewUser;
//!
//! let system = UsersSystem::from_config(&AppConfig::default());
//! let users = &system.users_client;
//!
//! users.use_users().await?;
//! users.create_user(NewUser::new("Ada Lovelace", "ada", false)).await?;
//!
//! system.shutdown().await.map_err(anyhow::Error::msg)?;
//! # Ok(())
//! # }
//! ```

pub mod app_system;
pub mod clients;
pub mod domain;
pub mod error;
pub mod notifications;
pub mod query_cache;
pub mod service;

#[cfg(test)]
mod mock_framework;
