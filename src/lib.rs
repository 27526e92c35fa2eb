//! Cache Aside - typed get-or-populate over a string key-value cache
//!
//! Reads go to the cache first; on a miss a per-key lock makes sure only one
//! caller in the process runs the value producer and writes the result back.

pub mod accessor;
pub mod cache;
pub mod config;
pub mod error;
pub mod locks;
pub mod serialization;
pub mod tasks;

pub use accessor::{CacheAccessor, CacheAccessorBuilder};
pub use cache::{DistributedCache, EntryOptions, MemoryCache};
pub use config::Config;
pub use error::{BoxError, CacheError, Result};
pub use locks::KeyLockRegistry;
pub use serialization::{DecodeError, JsonSerializer, Serializer};
pub use tasks::spawn_cleanup_task;
