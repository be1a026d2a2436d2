use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, Url};
use tracing::{debug, instrument};

use super::UserService;
use crate::domain::{NewUser, User, UserId, UserPatch};
use crate::error::ServiceError;

/// Artificial delay before each remote call, useful to watch optimistic
/// state on screen against a local fake server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedLatency {
    pub list: Duration,
    pub create: Duration,
    pub update: Duration,
}

/// [`UserService`] over the REST endpoints under `base_url`.
#[derive(Debug, Clone)]
pub struct HttpUserService {
    http: reqwest::Client,
    base_url: String,
    latency: SimulatedLatency,
}

impl HttpUserService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            latency: SimulatedLatency::default(),
        }
    }

    pub fn with_latency(mut self, latency: SimulatedLatency) -> Self {
        self.latency = latency;
        self
    }

    fn users_url(&self) -> String {
        format!("{}/users", self.base_url)
    }

    /// The id is pushed as a single path segment, so it is percent-encoded.
    fn user_url(&self, id: &UserId) -> Result<Url, ServiceError> {
        let mut url =
            Url::parse(&self.users_url()).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.base_url.clone()))?
            .push(id.as_str());
        Ok(url)
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ServiceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

#[async_trait]
impl UserService for HttpUserService {
    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        pause(self.latency.list).await;
        debug!("Sending request");
        let response = self.http.get(self.users_url()).send().await?;
        Ok(check_status(response)?.json().await?)
    }

    #[instrument(skip(self))]
    async fn create_user(&self, new_user: NewUser) -> Result<User, ServiceError> {
        pause(self.latency.create).await;
        debug!("Sending request");
        let response = self
            .http
            .post(self.users_url())
            .json(&new_user)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }

    #[instrument(skip(self))]
    async fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, ServiceError> {
        pause(self.latency.update).await;
        debug!("Sending request");
        let response = self
            .http
            .patch(self.user_url(&id)?)
            .json(&patch)
            .send()
            .await?;
        Ok(check_status(response)?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let service = HttpUserService::new("http://localhost:3000/");
        assert_eq!(service.users_url(), "http://localhost:3000/users");
        assert_eq!(
            service.user_url(&UserId::new("7")).unwrap().as_str(),
            "http://localhost:3000/users/7"
        );
    }

    #[test]
    fn user_url_encodes_reserved_characters() {
        let service = HttpUserService::new("http://localhost:3000");
        let url = service.user_url(&UserId::new("a/b?c#d")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/users/a%2Fb%3Fc%23d");
        assert_eq!(url.path_segments().unwrap().count(), 2);
    }

    #[test]
    fn unusable_base_url_is_reported() {
        let service = HttpUserService::new("not a url");
        assert!(matches!(
            service.user_url(&UserId::new("1")),
            Err(ServiceError::InvalidUrl(_))
        ));
    }
}
