//! Storage implementations.

pub mod index;
pub mod recency;
pub mod remote;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "memory")]
pub use memory::MemoryStorage;
#[cfg(feature = "redis")]
pub use self::redis::{RedisHashBackend, RedisStorage};
pub use remote::{HashBackend, RemoteStorage};
