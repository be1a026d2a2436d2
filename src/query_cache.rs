//! # Query Cache
//!
//! A process-wide keyed store of the last known value per query, run as an
//! actor. Every read and write goes through the actor's channel, so writes are
//! applied one at a time in the order they were sent.
//!
//! Besides plain `get`/`set`, each key tracks at most one in-flight fetch.
//! A fetch hands out a [`FetchTicket`]; [`QueryClient::cancel_in_flight`]
//! invalidates the ticket so that a late result can never overwrite a write
//! made after the cancel.

use std::collections::HashMap;
use std::fmt::Debug;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, trace};

use crate::error::CacheError;

pub type QueryKey = &'static str;

// =============================================================================
// 1. STATE
// =============================================================================

/// Snapshot of one key as subscribers see it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<V> {
    pub data: Option<V>,
    pub is_fetching: bool,
    /// Message of the last failed fetch, cleared once data arrives.
    pub error: Option<String>,
}

impl<V> Default for QueryState<V> {
    fn default() -> Self {
        Self {
            data: None,
            is_fetching: false,
            error: None,
        }
    }
}

impl<V> QueryState<V> {
    /// True until the key holds data.
    pub fn is_loading(&self) -> bool {
        self.data.is_none()
    }
}

/// Proof that the holder started the current fetch for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

/// Answer to [`QueryClient::begin_fetch`].
#[derive(Debug)]
pub enum FetchStart<V> {
    /// Data is already cached and never goes stale.
    Cached(V),
    /// Someone else is fetching; wait for the state to settle.
    Joined,
    /// The caller owns the fetch and must finish it.
    Started(FetchTicket),
}

pub type Updater<V> = Box<dyn FnOnce(Option<V>) -> Option<V> + Send>;

struct Entry<V> {
    state: watch::Sender<QueryState<V>>,
    generation: u64,
    in_flight: bool,
}

impl<V> Entry<V> {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            generation: 0,
            in_flight: false,
        }
    }
}

// =============================================================================
// 2. MESSAGES
// =============================================================================

type Response<T> = oneshot::Sender<T>;

pub enum CacheRequest<V> {
    Get {
        key: QueryKey,
        respond_to: Response<Option<V>>,
    },
    State {
        key: QueryKey,
        respond_to: Response<QueryState<V>>,
    },
    Set {
        key: QueryKey,
        updater: Updater<V>,
        respond_to: Response<Option<V>>,
    },
    CancelInFlight {
        key: QueryKey,
        respond_to: Response<bool>,
    },
    BeginFetch {
        key: QueryKey,
        respond_to: Response<FetchStart<V>>,
    },
    FinishFetch {
        ticket: FetchTicket,
        result: Result<V, String>,
        respond_to: Response<bool>,
    },
    Subscribe {
        key: QueryKey,
        respond_to: Response<watch::Receiver<QueryState<V>>>,
    },
}

// =============================================================================
// 3. THE ACTOR
// =============================================================================

pub struct QueryCacheActor<V> {
    receiver: mpsc::Receiver<CacheRequest<V>>,
    store: HashMap<QueryKey, Entry<V>>,
}

impl<V> QueryCacheActor<V>
where
    V: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(buffer_size: usize) -> (Self, QueryClient<V>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            store: HashMap::new(),
        };
        (actor, QueryClient { sender })
    }

    #[instrument(name = "query_cache", skip(self))]
    pub async fn run(mut self) {
        info!("Query cache starting");
        while let Some(msg) = self.receiver.recv().await {
            self.handle(msg);
        }
        info!("Query cache stopped");
    }

    fn entry(&mut self, key: QueryKey) -> &mut Entry<V> {
        self.store.entry(key).or_insert_with(Entry::new)
    }

    fn handle(&mut self, msg: CacheRequest<V>) {
        match msg {
            CacheRequest::Get { key, respond_to } => {
                let data = self.entry(key).state.borrow().data.clone();
                let _ = respond_to.send(data);
            }
            CacheRequest::State { key, respond_to } => {
                let state = self.entry(key).state.borrow().clone();
                let _ = respond_to.send(state);
            }
            CacheRequest::Set { key, updater, respond_to } => {
                let entry = self.entry(key);
                let previous = entry.state.borrow().data.clone();
                let next = updater(previous.clone());
                trace!(key, ?next, "Applying cache write");
                entry.state.send_modify(|state| {
                    if next.is_some() {
                        state.error = None;
                    }
                    state.data = next;
                });
                let _ = respond_to.send(previous);
            }
            CacheRequest::CancelInFlight { key, respond_to } => {
                let entry = self.entry(key);
                let cancelled = entry.in_flight;
                if cancelled {
                    entry.in_flight = false;
                    entry.generation += 1;
                    entry.state.send_modify(|state| state.is_fetching = false);
                    debug!(key, "Cancelled in-flight fetch");
                }
                let _ = respond_to.send(cancelled);
            }
            CacheRequest::BeginFetch { key, respond_to } => {
                let entry = self.entry(key);
                let cached = entry.state.borrow().data.clone();
                let start = match cached {
                    Some(data) => FetchStart::Cached(data),
                    None if entry.in_flight => FetchStart::Joined,
                    None => {
                        entry.in_flight = true;
                        entry.generation += 1;
                        entry.state.send_modify(|state| state.is_fetching = true);
                        FetchStart::Started(FetchTicket {
                            key,
                            generation: entry.generation,
                        })
                    }
                };
                let _ = respond_to.send(start);
            }
            CacheRequest::FinishFetch { ticket, result, respond_to } => {
                let entry = self.entry(ticket.key);
                let current = entry.in_flight && entry.generation == ticket.generation;
                if current {
                    entry.in_flight = false;
                    entry.state.send_modify(|state| {
                        state.is_fetching = false;
                        match result {
                            Ok(data) => {
                                state.data = Some(data);
                                state.error = None;
                            }
                            Err(message) => state.error = Some(message),
                        }
                    });
                } else {
                    debug!(key = ticket.key, "Discarding result of cancelled fetch");
                }
                let _ = respond_to.send(current);
            }
            CacheRequest::Subscribe { key, respond_to } => {
                let receiver = self.entry(key).state.subscribe();
                let _ = respond_to.send(receiver);
            }
        }
    }
}

// =============================================================================
// 4. THE CLIENT
// =============================================================================

/// Cloneable handle to a running [`QueryCacheActor`].
pub struct QueryClient<V> {
    sender: mpsc::Sender<CacheRequest<V>>,
}

impl<V> Clone for QueryClient<V> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<V> QueryClient<V>
where
    V: Send + 'static,
{
    async fn call<T>(
        &self,
        request: impl FnOnce(Response<T>) -> CacheRequest<V>,
    ) -> Result<T, CacheError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(request(respond_to))
            .await
            .map_err(|_| CacheError::ActorClosed)?;
        response.await.map_err(|_| CacheError::ActorDropped)
    }

    pub async fn get(&self, key: QueryKey) -> Result<Option<V>, CacheError> {
        self.call(|respond_to| CacheRequest::Get { key, respond_to }).await
    }

    pub async fn state(&self, key: QueryKey) -> Result<QueryState<V>, CacheError> {
        self.call(|respond_to| CacheRequest::State { key, respond_to }).await
    }

    /// Replaces the value under `key` with `updater(current)`.
    ///
    /// Returns the value held right before this write. No other write can land
    /// between reading that value and storing the new one.
    pub async fn set<F>(&self, key: QueryKey, updater: F) -> Result<Option<V>, CacheError>
    where
        F: FnOnce(Option<V>) -> Option<V> + Send + 'static,
    {
        let updater: Updater<V> = Box::new(updater);
        self.call(|respond_to| CacheRequest::Set { key, updater, respond_to })
            .await
    }

    /// Stops any fetch for `key` that is still outstanding from ever writing.
    ///
    /// Requests are handled in order, so once this returns every write sent
    /// before it has been applied. Returns whether a fetch was cancelled.
    pub async fn cancel_in_flight(&self, key: QueryKey) -> Result<bool, CacheError> {
        self.call(|respond_to| CacheRequest::CancelInFlight { key, respond_to })
            .await
    }

    pub async fn begin_fetch(&self, key: QueryKey) -> Result<FetchStart<V>, CacheError> {
        self.call(|respond_to| CacheRequest::BeginFetch { key, respond_to })
            .await
    }

    /// Stores the outcome of a fetch. Returns `false` if the ticket was
    /// cancelled in the meantime and the result was dropped.
    pub async fn finish_fetch(
        &self,
        ticket: FetchTicket,
        result: Result<V, String>,
    ) -> Result<bool, CacheError> {
        self.call(|respond_to| CacheRequest::FinishFetch {
            ticket,
            result,
            respond_to,
        })
        .await
    }

    pub async fn subscribe(
        &self,
        key: QueryKey,
    ) -> Result<watch::Receiver<QueryState<V>>, CacheError> {
        self.call(|respond_to| CacheRequest::Subscribe { key, respond_to })
            .await
    }
}
