use thiserror::Error;

/// Failures talking to the remote user service.
///
/// These are all "the network call did not give us a user" from the point of
/// view of the mutation flows; the variants only exist for logging.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Failures reaching the query cache actor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache actor closed")]
    ActorClosed,
    #[error("Cache actor dropped the request")]
    ActorDropped,
}
