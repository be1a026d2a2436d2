//! Handles the presentation layer talks to.

pub mod users_client;

pub use users_client::*;
