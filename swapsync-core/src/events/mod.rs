//! Event types and in-process channels.
//!
//! Two kinds of messaging exist side by side: durable Redis queues carry
//! [`NewListing`] and [`TradeEvent`] payloads between processes and across
//! restarts (see [`crate::store`]), while the tokio channels defined in
//! [`channels`] stay inside the process.

pub mod channels;
pub mod types;

pub use channels::{
    collection_signal_channel, expiry_insert_channel, CollectionSignalReceiver,
    CollectionSignalSender, ExpiryInsertReceiver, ExpiryInsertSender, DEFAULT_CHANNEL_BUFFER,
};
pub use types::{NewListing, TradeEvent};
