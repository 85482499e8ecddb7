//! In-memory structures owned by single worker tasks.
//!
//! Neither structure is shared: the expiry wheel lives inside the expiry
//! worker and the price heaps inside the floor engine, so no locking is
//! needed. Cross-task traffic goes through the queues and channels in
//! [`crate::events`].

pub mod expiry_wheel;
pub mod price_heap;

pub use expiry_wheel::{ExpiryNode, ExpiryWheel, WHEEL_SIZE};
pub use price_heap::{PriceEntry, PriceHeap, PRICE_HEAP_CAP};
