//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the in-memory store.
//!
//! # Tasks
//! - Expiration purge: removes expired entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
