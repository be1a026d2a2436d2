use std::sync::Arc;

use tracing::{error, info};

use crate::app_system::AppConfig;
use crate::clients::{UsersClient, UsersQueryData};
use crate::notifications::Notifier;
use crate::query_cache::QueryCacheActor;
use crate::service::{HttpUserService, SimulatedLatency, UserService};

const NOTIFICATION_CAPACITY: usize = 16;

/// Owns the running cache actor and hands out the client wired to it.
pub struct UsersSystem {
    pub users_client: UsersClient,
    handle: tokio::task::JoinHandle<()>,
}

impl UsersSystem {
    /// Starts the cache and wires it to an HTTP service built from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let service = HttpUserService::new(config.base_url.as_str())
            .with_latency(SimulatedLatency::from(&config.latency));
        Self::new(Arc::new(service), config.cache_buffer)
    }

    pub fn new(service: Arc<dyn UserService>, cache_buffer: usize) -> Self {
        let (cache_actor, cache_client) = QueryCacheActor::<UsersQueryData>::new(cache_buffer);
        let handle = tokio::spawn(cache_actor.run());
        let users_client =
            UsersClient::new(cache_client, service, Notifier::new(NOTIFICATION_CAPACITY));

        Self {
            users_client,
            handle,
        }
    }

    /// Drops the client, which closes the cache channel, and waits for the
    /// actor to stop. Clones of the client still alive elsewhere keep the
    /// actor running.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down users system...");
        drop(self.users_client);

        if let Err(e) = self.handle.await {
            error!("Cache actor failed: {:?}", e);
            return Err(format!("Cache actor failed: {:?}", e));
        }

        info!("Users system shutdown complete.");
        Ok(())
    }
}
