//! Shared types used across the rental orchestrator crates.

pub mod page;
pub mod types;

pub use page::{InvalidPage, MAX_LIMIT, Page, PageRequest};
pub use types::{ParseUidError, Uid};
