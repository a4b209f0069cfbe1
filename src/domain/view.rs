use std::sync::Arc;

use crate::domain::{chat_item::ChatItem, classification::Classification};

/// Connection state of a channel's upstream producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedItem {
    pub item: Arc<ChatItem>,
    pub classification: Classification,
    /// Position in the channel's upstream order, starting at 0.
    pub seq: u64,
}

/// Materialized, rule-filtered view of a channel. Suppressed items are
/// never part of `items`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelView {
    pub items: Arc<Vec<ClassifiedItem>>,
    pub status: UpstreamStatus,
    /// Revision of the rule snapshot the items were classified against.
    pub rules_revision: u64,
    /// Sequence number of the oldest item still buffered, suppressed or not.
    /// Everything before it has scrolled out.
    pub first_seq: u64,
    /// Sequence number the next upstream item will get.
    pub next_seq: u64,
}

impl ChannelView {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&ClassifiedItem> {
        self.items.last()
    }

    pub fn highlighted(&self) -> impl Iterator<Item = &ClassifiedItem> {
        self.items
            .iter()
            .filter(|entry| entry.classification.highlighted_by().is_some())
    }
}
