//! In-process channel factories and handles.

use crate::ordermanager::expiry_wheel::ExpiryNode;
use tokio::sync::mpsc;

/// Default buffer size for in-process channels; enough for bursts while
/// keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for timer-wheel insertions.
pub type ExpiryInsertSender = mpsc::Sender<ExpiryNode>;
/// Receiver handle for timer-wheel insertions.
pub type ExpiryInsertReceiver = mpsc::Receiver<ExpiryNode>;

/// Sender handle for collection-mutation signals.
pub type CollectionSignalSender = mpsc::Sender<String>;
/// Receiver handle for collection-mutation signals.
pub type CollectionSignalReceiver = mpsc::Receiver<String>;

/// Channel through which the listing worker hands expiry nodes (by value)
/// to the timer-wheel task.
pub fn expiry_insert_channel() -> (ExpiryInsertSender, ExpiryInsertReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Channel through which the floor engine nudges the listed-count
/// aggregator. Senders use `try_send`; a dropped signal is repaired by the
/// aggregator's next periodic pass.
pub fn collection_signal_channel() -> (CollectionSignalSender, CollectionSignalReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
