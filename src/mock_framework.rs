//! # Mock Framework
//!
//! Utilities for testing the users client without a server.
//!
//! [`create_mock_service`] returns a [`UserService`] whose every call is
//! forwarded to a channel the test owns. While a call sits on that channel the
//! test can inspect the cache (the optimistic window), then answer through the
//! responder with success or failure.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::clients::{UsersClient, UsersQueryData};
use crate::domain::{NewUser, User, UserId, UserPatch};
use crate::error::ServiceError;
use crate::notifications::Notifier;
use crate::query_cache::QueryCacheActor;
use crate::service::UserService;

pub type Responder<T> = oneshot::Sender<Result<T, ServiceError>>;

#[derive(Debug)]
pub enum ServiceCall {
    List {
        respond_to: Responder<Vec<User>>,
    },
    Create {
        new_user: NewUser,
        respond_to: Responder<User>,
    },
    Update {
        id: UserId,
        patch: UserPatch,
        respond_to: Responder<User>,
    },
}

pub struct MockUserService {
    sender: mpsc::Sender<ServiceCall>,
}

impl MockUserService {
    async fn call<T>(
        &self,
        call: impl FnOnce(Responder<T>) -> ServiceCall,
    ) -> Result<T, ServiceError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(call(respond_to))
            .await
            .map_err(|_| ServiceError::Transport("Mock closed".to_string()))?;
        response
            .await
            .map_err(|_| ServiceError::Transport("Mock dropped".to_string()))?
    }
}

#[async_trait]
impl UserService for MockUserService {
    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        self.call(|respond_to| ServiceCall::List { respond_to }).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, ServiceError> {
        self.call(|respond_to| ServiceCall::Create {
            new_user,
            respond_to,
        })
        .await
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, ServiceError> {
        self.call(|respond_to| ServiceCall::Update {
            id,
            patch,
            respond_to,
        })
        .await
    }
}

/// Creates a mock service and the receiver its calls arrive on.
pub fn create_mock_service(
    buffer_size: usize,
) -> (Arc<MockUserService>, mpsc::Receiver<ServiceCall>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (Arc::new(MockUserService { sender }), receiver)
}

/// Starts a cache actor and returns a users client backed by a mock service.
pub fn start_users_client() -> (UsersClient, mpsc::Receiver<ServiceCall>) {
    let (service, receiver) = create_mock_service(16);
    let (actor, cache) = QueryCacheActor::<UsersQueryData>::new(16);
    tokio::spawn(actor.run());
    (UsersClient::new(cache, service, Notifier::new(16)), receiver)
}

pub fn network_error() -> ServiceError {
    ServiceError::Transport("connection refused".to_string())
}

/// Helper to verify that the next call is a list
pub async fn expect_list(receiver: &mut mpsc::Receiver<ServiceCall>) -> Option<Responder<Vec<User>>> {
    match receiver.recv().await {
        Some(ServiceCall::List { respond_to }) => Some(respond_to),
        _ => None,
    }
}

/// Helper to verify that the next call is a create
pub async fn expect_create(
    receiver: &mut mpsc::Receiver<ServiceCall>,
) -> Option<(NewUser, Responder<User>)> {
    match receiver.recv().await {
        Some(ServiceCall::Create {
            new_user,
            respond_to,
        }) => Some((new_user, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next call is an update
pub async fn expect_update(
    receiver: &mut mpsc::Receiver<ServiceCall>,
) -> Option<(UserId, UserPatch, Responder<User>)> {
    match receiver.recv().await {
        Some(ServiceCall::Update {
            id,
            patch,
            respond_to,
        }) => Some((id, patch, respond_to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_service() {
        let (service, mut receiver) = create_mock_service(10);

        let create_task = tokio::spawn(async move {
            service.create_user(NewUser::new("Test", "test", false)).await
        });

        let (new_user, responder) = expect_create(&mut receiver)
            .await
            .expect("Expected Create call");
        assert_eq!(new_user.name, "Test");
        responder.send(Ok(User::new("u1", "Test", "test", false))).unwrap();

        let created = create_task.await.unwrap().unwrap();
        assert_eq!(created.id, UserId::new("u1"));
    }
}
