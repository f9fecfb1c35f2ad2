//! Persistent, crash-tolerant job queue over a shared store.
//!
//! This crate provides:
//! - The [`JobStore`] trait: conditional-update transitions against a
//!   shared record table, the only cross-instance coordination surface
//! - A Redis-backed store where every transition is one Lua script
//! - An in-memory store with identical semantics for tests and
//!   embedded use
//! - The [`JobQueue`] facade: idempotent submission plus status and
//!   statistics queries

pub mod config;
pub mod error;
pub mod memory;
pub mod queue;
pub mod redis_store;
pub mod store;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use memory::MemoryJobStore;
pub use queue::JobQueue;
pub use redis_store::RedisJobStore;
pub use store::JobStore;
