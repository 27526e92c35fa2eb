//! Cache Module
//!
//! The string store contract, its expiration options, and an in-memory implementation.

mod distributed;
mod entry;
mod memory;
mod options;
mod stats;


// Re-export public types
pub use distributed::DistributedCache;
pub use entry::CacheEntry;
pub use memory::MemoryCache;
pub use options::EntryOptions;
pub use stats::CacheStats;
