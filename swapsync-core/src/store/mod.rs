//! Durable queue and cache access (Redis).

pub mod redis;

pub use self::redis::{RedisStore, StoreError};
