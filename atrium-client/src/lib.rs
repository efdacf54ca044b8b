//! Atrium Client - Resilient Typed HTTP Client
//!
//! A reqwest-backed JSON API client with bearer-token injection, transient
//! failure retry with exponential backoff, paginated-shape discovery, and
//! auth signals published over a broadcast channel. The network sits behind
//! the [`Transport`] trait so tests run against an in-memory transport.

pub mod auth;
pub mod client;
pub mod config;
pub mod transport;

pub use auth::{AuthEvent, TokenProvider, TOKEN_EXPIRED_HEADER};
pub use client::{ApiClient, DEFAULT_RETRIES};
pub use config::{ClientConfig, ConfigError, DEFAULT_CONTENT_TTL_SECS};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

pub use atrium_core::{ApiError, Page};
