//! Per-channel multicast of classified chat views.
//!
//! Each channel has at most one upstream connection, no matter how many
//! subscribers it has. New subscribers get the latest view immediately. When
//! the last subscriber leaves, an idle timer runs; the upstream is only torn
//! down if nobody resubscribes before it fires.

mod pump;
pub mod source;
mod subscription;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{runtime::Handle, sync::watch};

use crate::{
    domain::{chat_item::ChannelId, view::ChannelView},
    hub::pump::Pump,
    infra::config::HubConfig,
    rules::RuleStore,
};

pub use source::{upstream_channel, ChatSource, ChatSourceError};
pub use subscription::ChannelSubscription;

/// Returns the hub module name for smoke checks.
pub fn module_name() -> &'static str {
    "hub"
}

const HUB_CHANNEL_STARTED: &str = "HUB_CHANNEL_STARTED";
const HUB_CHANNEL_IDLE: &str = "HUB_CHANNEL_IDLE";
const HUB_CHANNEL_TORN_DOWN: &str = "HUB_CHANNEL_TORN_DOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubOptions {
    pub idle_timeout: Duration,
    pub scrollback: usize,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self::from(&HubConfig::default())
    }
}

impl From<&HubConfig> for HubOptions {
    fn from(config: &HubConfig) -> Self {
        Self {
            idle_timeout: Duration::from_millis(config.idle_timeout_ms),
            scrollback: config.scrollback,
        }
    }
}

#[derive(Clone)]
pub struct ChannelStreamHub {
    inner: Arc<HubInner>,
}

pub(crate) struct HubInner {
    source: Arc<dyn ChatSource>,
    rules: Arc<RuleStore>,
    runtime: Handle,
    options: HubOptions,
    channels: Mutex<HashMap<ChannelId, ChannelSlot>>,
}

struct ChannelSlot {
    views: watch::Sender<ChannelView>,
    stop_tx: watch::Sender<bool>,
    subscribers: usize,
    /// Bumped on every subscribe and release; stale idle timers compare it.
    generation: u64,
}

impl ChannelStreamHub {
    /// Pumps and idle timers are spawned on `runtime`.
    pub fn new(
        source: Arc<dyn ChatSource>,
        rules: Arc<RuleStore>,
        options: HubOptions,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                source,
                rules,
                runtime,
                options,
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns immediately; the view fills in asynchronously.
    pub fn subscribe(&self, channel: ChannelId) -> ChannelSubscription {
        let mut channels = self.inner.lock_channels();
        let slot = channels
            .entry(channel.clone())
            .or_insert_with(|| self.inner.start_channel(&channel));
        slot.subscribers += 1;
        slot.generation += 1;
        let views = slot.views.subscribe();
        drop(channels);

        ChannelSubscription::new(channel, views, Arc::clone(&self.inner))
    }

    pub fn subscriber_count(&self, channel: &ChannelId) -> usize {
        self.inner
            .lock_channels()
            .get(channel)
            .map_or(0, |slot| slot.subscribers)
    }

    /// Whether the channel still holds an upstream connection, including
    /// during its idle window.
    pub fn is_active(&self, channel: &ChannelId) -> bool {
        self.inner.lock_channels().contains_key(channel)
    }

    pub fn active_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = self.inner.lock_channels().keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn options(&self) -> HubOptions {
        self.inner.options
    }
}

impl std::fmt::Debug for ChannelStreamHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelStreamHub")
            .field("options", &self.inner.options)
            .field("active_channels", &self.active_channels())
            .finish_non_exhaustive()
    }
}

impl HubInner {
    fn lock_channels(&self) -> MutexGuard<'_, HashMap<ChannelId, ChannelSlot>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_channel(&self, channel: &ChannelId) -> ChannelSlot {
        let (views, _) = watch::channel(ChannelView::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let pump = Pump {
            channel: channel.clone(),
            source: Arc::clone(&self.source),
            rules: Arc::clone(&self.rules),
            views: views.clone(),
            stop_rx,
            scrollback: self.options.scrollback,
        };
        self.runtime.spawn(pump.run());

        tracing::debug!(
            code = HUB_CHANNEL_STARTED,
            channel = %channel,
            "channel pump started"
        );

        ChannelSlot {
            views,
            stop_tx,
            subscribers: 0,
            generation: 0,
        }
    }

    pub(crate) fn release(this: &Arc<Self>, channel: &ChannelId) {
        let mut channels = this.lock_channels();
        let Some(slot) = channels.get_mut(channel) else {
            return;
        };

        slot.subscribers = slot.subscribers.saturating_sub(1);
        if slot.subscribers > 0 {
            return;
        }

        slot.generation += 1;
        let generation = slot.generation;
        drop(channels);

        tracing::debug!(
            code = HUB_CHANNEL_IDLE,
            channel = %channel,
            idle_timeout_ms = this.options.idle_timeout.as_millis() as u64,
            "last subscriber left; idle timer started"
        );

        let hub = Arc::downgrade(this);
        let channel = channel.clone();
        let idle_timeout = this.options.idle_timeout;
        this.runtime.spawn(async move {
            tokio::time::sleep(idle_timeout).await;
            if let Some(hub) = hub.upgrade() {
                hub.teardown_if_idle(&channel, generation);
            }
        });
    }

    fn teardown_if_idle(&self, channel: &ChannelId, generation: u64) {
        let mut channels = self.lock_channels();
        let idle = channels
            .get(channel)
            .is_some_and(|slot| slot.subscribers == 0 && slot.generation == generation);
        if !idle {
            return;
        }

        if let Some(slot) = channels.remove(channel) {
            let _ = slot.stop_tx.send(true);
            tracing::info!(
                code = HUB_CHANNEL_TORN_DOWN,
                channel = %channel,
                "idle channel torn down"
            );
        }
    }
}
