use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::chat_item::{ChannelId, ChatItem};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatSourceError {
    #[error("channel {0} is not available upstream")]
    ChannelNotFound(ChannelId),
    #[error("upstream producer is unavailable")]
    Unavailable,
}

/// External producer of raw chat items.
///
/// `connect` is called from inside the hub's runtime, at most once per live
/// channel connection. The connection ends when either side drops its half
/// of the channel.
pub trait ChatSource: Send + Sync + 'static {
    fn connect(&self, channel: &ChannelId) -> Result<mpsc::Receiver<ChatItem>, ChatSourceError>;
}

/// Bounded item channel for one upstream connection.
pub fn upstream_channel(capacity: usize) -> (mpsc::Sender<ChatItem>, mpsc::Receiver<ChatItem>) {
    mpsc::channel(capacity.max(1))
}
