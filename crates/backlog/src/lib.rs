//! Retry backlog for mutating requests that could not be delivered.
//!
//! A producer appends serialized requests to an ordered, durable stream. A
//! single consumer replays them one at a time; a failed replay rewinds the
//! cursor so the same message is delivered again. Delivery is therefore
//! at-least-once and strictly ordered, and a request that keeps failing blocks
//! everything queued behind it.

pub mod consumer;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod producer;
pub mod request;
pub mod transport;

pub use consumer::BacklogConsumer;
pub use error::{BacklogError, Result};
pub use memory::InMemoryTransport;
pub use postgres::PostgresTransport;
pub use producer::{BacklogProducer, RetryQueue};
pub use request::BacklogRequest;
pub use transport::{BacklogMessage, BacklogTransport, Position};
