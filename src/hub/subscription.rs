use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    domain::{chat_item::ChannelId, view::ChannelView},
    hub::HubInner,
};

/// Live handle on one channel's materialized view.
///
/// Dropping the handle unsubscribes. The upstream connection is only torn
/// down once the channel has had no subscribers for the hub's idle timeout.
pub struct ChannelSubscription {
    channel: ChannelId,
    views: watch::Receiver<ChannelView>,
    hub: Arc<HubInner>,
    initial_pending: bool,
    released: bool,
}

impl ChannelSubscription {
    pub(crate) fn new(
        channel: ChannelId,
        views: watch::Receiver<ChannelView>,
        hub: Arc<HubInner>,
    ) -> Self {
        Self {
            channel,
            views,
            hub,
            initial_pending: true,
            released: false,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Last published view, without waiting.
    pub fn current(&self) -> ChannelView {
        self.views.borrow().clone()
    }

    /// Yields the current view on the first call, then each newer view.
    /// Returns `None` once unsubscribed.
    pub async fn next(&mut self) -> Option<ChannelView> {
        if self.released {
            return None;
        }

        if std::mem::take(&mut self.initial_pending) {
            return Some(self.views.borrow_and_update().clone());
        }

        self.views.changed().await.ok()?;
        Some(self.views.borrow_and_update().clone())
    }

    /// Idempotent; never blocks.
    pub fn unsubscribe(&mut self) {
        if !std::mem::replace(&mut self.released, true) {
            HubInner::release(&self.hub, &self.channel);
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for ChannelSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("channel", &self.channel)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
