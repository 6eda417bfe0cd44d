//! Key-value persistence for conversations and invoices.
//!
//! The engine talks to a [`ConversationStore`] repository, which builds the
//! namespaced keys and serializes domain values. The repository is generic
//! over a small [`KvStore`] trait with two interchangeable backends:
//! an in-memory map for tests and Redis for production.

pub mod keys;
pub mod kv;
pub mod memory;
pub mod redis_backend;
pub mod repository;

pub use kv::{KvStore, StoreError};
pub use memory::InMemoryStore;
pub use redis_backend::RedisStore;
pub use repository::ConversationStore;
