//! Atrium Core - Shared Types and Pure JSON Logic
//!
//! Everything in this crate is I/O-free: the structured API error type,
//! the paginated-shape discovery heuristic, and the lenient JSON decoding
//! adapter. The client and content crates build on top of it.

pub mod error;
pub mod lenient;
pub mod paging;

pub use error::{is_transient_status, ApiError};
pub use lenient::from_value_lenient;
pub use paging::{decode_page, discover, Discovered, Page};
