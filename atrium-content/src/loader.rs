//! Single-flight content loading with a TTL memory cache.
//!
//! For a given name, at most one fetch is in flight at a time: the first
//! caller creates a shared ticket, later callers await the same ticket, and
//! every waiter observes the same outcome. Successful results enter the
//! cache with a fixed TTL; failures resolve to `None` and free the name for
//! the next caller to retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use crate::fetch::ContentFetcher;

/// Cache TTL used by [`ContentLoader::with_default_ttl`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// A shared, awaitable fetch outcome. Cloned by every caller that piles onto
/// the same in-flight fetch.
type Ticket = Shared<BoxFuture<'static, Option<Bytes>>>;

struct CacheEntry {
    bytes: Bytes,
    expires_at: Instant,
}

#[derive(Default)]
struct LoaderState {
    cache: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, Ticket>,
}

struct Inner {
    fetcher: Arc<dyn ContentFetcher>,
    ttl: Duration,
    // One lock over both maps: the cache check and the ticket
    // check-then-create must be a single critical section. Never held
    // across an await.
    state: Mutex<LoaderState>,
}

/// Cheap-clone handle to the shared cache; clones coalesce with each other.
#[derive(Clone)]
pub struct ContentLoader {
    inner: Arc<Inner>,
}

impl ContentLoader {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                ttl,
                state: Mutex::new(LoaderState::default()),
            }),
        }
    }

    pub fn with_default_ttl(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self::new(fetcher, DEFAULT_TTL)
    }

    /// Raw bytes of a named resource: from cache if live, otherwise from the
    /// single in-flight fetch for that name. Never raises; all failures
    /// resolve to `None`.
    pub async fn fetch_bytes(&self, name: &str) -> Option<Bytes> {
        let ticket = {
            let mut state = lock_state(&self.inner.state);
            if let Some(entry) = state.cache.get(name) {
                if entry.expires_at > Instant::now() {
                    return Some(entry.bytes.clone());
                }
            }
            match state.in_flight.get(name) {
                Some(ticket) => ticket.clone(),
                None => {
                    let ticket = spawn_fetch(&self.inner, name.to_string());
                    state.in_flight.insert(name.to_string(), ticket.clone());
                    ticket
                }
            }
        };
        ticket.await
    }

    /// Decode a named resource into `T`; decode failures are absorbed into
    /// `None` like everything else here.
    pub async fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let bytes = self.fetch_bytes(name).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(name, error = %err, "content decode failed");
                None
            }
        }
    }

    /// The resource as UTF-8 text; invalid UTF-8 yields `None`.
    pub async fn fetch_text(&self, name: &str) -> Option<String> {
        let bytes = self.fetch_bytes(name).await?;
        String::from_utf8(bytes.to_vec()).ok()
    }

    /// Fire-and-forget warm-up: start one concurrent fetch per name and
    /// return immediately, ignoring every outcome.
    pub fn preload(&self, names: &[&str]) {
        for name in names {
            let loader = self.clone();
            let name = name.to_string();
            tokio::spawn(async move {
                let _ = loader.fetch_bytes(&name).await;
            });
        }
    }

    /// Awaitable variant of [`ContentLoader::preload`]: fetches run
    /// concurrently and this resolves once all have settled.
    pub async fn warm(&self, names: &[&str]) {
        futures_util::future::join_all(names.iter().map(|name| self.fetch_bytes(name))).await;
    }
}

/// Spawned as a task so a caller dropping its future cannot abandon the
/// ticket mid-fetch; the guard removes the ticket on settle, win or lose,
/// before any waiter wakes.
fn spawn_fetch(inner: &Arc<Inner>, name: String) -> Ticket {
    let inner = Arc::clone(inner);
    let handle = tokio::spawn(async move {
        let _guard = TicketGuard {
            inner: Arc::clone(&inner),
            name: name.clone(),
        };
        match inner.fetcher.fetch(&name).await {
            Ok(bytes) => {
                let mut state = lock_state(&inner.state);
                state.cache.insert(
                    name,
                    CacheEntry {
                        bytes: bytes.clone(),
                        expires_at: Instant::now() + inner.ttl,
                    },
                );
                Some(bytes)
            }
            Err(err) => {
                tracing::warn!(name = %name, error = %err, "content fetch failed");
                None
            }
        }
    });
    handle.map(|joined| joined.unwrap_or(None)).boxed().shared()
}

struct TicketGuard {
    inner: Arc<Inner>,
    name: String,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        lock_state(&self.inner.state).in_flight.remove(&self.name);
    }
}

fn lock_state(state: &Mutex<LoaderState>) -> MutexGuard<'_, LoaderState> {
    // A poisoned lock only means some fetch task panicked; the maps are
    // still coherent, so keep serving.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
