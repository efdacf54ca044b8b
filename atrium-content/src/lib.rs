//! Atrium Content - Cached Content Loading
//!
//! Best-effort loader for named JSON resources from a static content store.
//! Concurrent fetches of the same name coalesce into one network call, and
//! results live in a short-TTL memory cache. All failures resolve to an
//! absent value: content resources have designed-in fallbacks upstream, so
//! nothing here ever raises to a caller.

pub mod fetch;
pub mod loader;

pub use fetch::{ContentError, ContentFetcher, HttpContentFetcher};
pub use loader::{ContentLoader, DEFAULT_TTL};
