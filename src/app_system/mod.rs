//! System orchestration, configuration, startup, and shutdown logic.

pub mod config;
pub mod tracing;
pub mod users_system;

pub use config::*;
pub use self::tracing::*;
pub use users_system::*;
