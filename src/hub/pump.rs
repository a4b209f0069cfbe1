use std::{collections::VecDeque, sync::Arc};

use tokio::sync::watch;

use crate::{
    domain::{
        chat_item::{ChannelId, ChatItem},
        view::{ChannelView, ClassifiedItem, UpstreamStatus},
    },
    hub::source::ChatSource,
    rules::{classify, RuleSnapshot, RuleStore},
};

const HUB_UPSTREAM_CONNECTED: &str = "HUB_UPSTREAM_CONNECTED";
const HUB_UPSTREAM_CONNECT_FAILED: &str = "HUB_UPSTREAM_CONNECT_FAILED";
const HUB_UPSTREAM_DISCONNECTED: &str = "HUB_UPSTREAM_DISCONNECTED";
const HUB_PUMP_STOPPED: &str = "HUB_PUMP_STOPPED";
const HUB_RULES_UNAVAILABLE: &str = "HUB_RULES_UNAVAILABLE";

/// Everything one channel's pump task owns.
pub(crate) struct Pump {
    pub channel: ChannelId,
    pub source: Arc<dyn ChatSource>,
    pub rules: Arc<RuleStore>,
    pub views: watch::Sender<ChannelView>,
    pub stop_rx: watch::Receiver<bool>,
    pub scrollback: usize,
}

impl Pump {
    /// Sole writer of the channel's view, so views reach every subscriber
    /// in upstream order.
    pub(crate) async fn run(self) {
        let Pump {
            channel,
            source,
            rules,
            views,
            mut stop_rx,
            scrollback,
        } = self;

        let mut rules_rx = match tokio::task::spawn_blocking(move || rules.watch()).await {
            Ok(rules_rx) => rules_rx,
            Err(error) => {
                tracing::warn!(
                    code = HUB_RULES_UNAVAILABLE,
                    channel = %channel,
                    error = %error,
                    "rule snapshot could not be loaded for channel"
                );
                views.send_modify(|view| view.status = UpstreamStatus::Disconnected);
                wait_for_stop(&mut stop_rx).await;
                return;
            }
        };

        let mut upstream = match source.connect(&channel) {
            Ok(upstream) => upstream,
            Err(error) => {
                tracing::warn!(
                    code = HUB_UPSTREAM_CONNECT_FAILED,
                    channel = %channel,
                    error = %error,
                    "upstream connect failed"
                );
                views.send_modify(|view| view.status = UpstreamStatus::Disconnected);
                wait_for_stop(&mut stop_rx).await;
                return;
            }
        };

        tracing::info!(
            code = HUB_UPSTREAM_CONNECTED,
            channel = %channel,
            "upstream connected"
        );

        let mut snapshot = rules_rx.borrow_and_update().clone();
        let mut buffer = ChannelBuffer::new(scrollback);
        let mut status = UpstreamStatus::Connected;
        let mut rules_open = true;
        views.send_replace(buffer.view(status, &snapshot));

        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        tracing::info!(
                            code = HUB_PUMP_STOPPED,
                            channel = %channel,
                            "channel pump stopped"
                        );
                        return;
                    }
                }
                item = upstream.recv(), if status == UpstreamStatus::Connected => {
                    match item {
                        Some(item) => buffer.push(item, &snapshot),
                        None => {
                            tracing::warn!(
                                code = HUB_UPSTREAM_DISCONNECTED,
                                channel = %channel,
                                "upstream closed; keeping last view"
                            );
                            status = UpstreamStatus::Disconnected;
                        }
                    }
                    views.send_replace(buffer.view(status, &snapshot));
                }
                changed = rules_rx.changed(), if rules_open => {
                    if changed.is_err() {
                        rules_open = false;
                    } else {
                        snapshot = rules_rx.borrow_and_update().clone();
                        buffer.reclassify(&snapshot);
                        views.send_replace(buffer.view(status, &snapshot));
                    }
                }
            }
        }
    }
}

async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    while stop_rx.changed().await.is_ok() {
        if *stop_rx.borrow() {
            break;
        }
    }
}

/// Bounded scrollback with each item's current classification.
struct ChannelBuffer {
    items: VecDeque<ClassifiedItem>,
    capacity: usize,
    next_seq: u64,
}

impl ChannelBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    fn push(&mut self, item: ChatItem, snapshot: &RuleSnapshot) {
        let classification = classify(&item, snapshot);
        self.items.push_back(ClassifiedItem {
            item: Arc::new(item),
            classification,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    fn reclassify(&mut self, snapshot: &RuleSnapshot) {
        for entry in &mut self.items {
            entry.classification = classify(&entry.item, snapshot);
        }
    }

    fn view(&self, status: UpstreamStatus, snapshot: &RuleSnapshot) -> ChannelView {
        let visible = self
            .items
            .iter()
            .filter(|entry| !entry.classification.is_suppressed())
            .cloned()
            .collect();

        ChannelView {
            items: Arc::new(visible),
            status,
            rules_revision: snapshot.revision(),
            first_seq: self.items.front().map_or(self.next_seq, |entry| entry.seq),
            next_seq: self.next_seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::rule::{BlacklistEntry, HighlightRule, Pattern},
        test_support::chat_item,
    };

    #[test]
    fn buffer_drops_oldest_beyond_capacity() {
        let snapshot = RuleSnapshot::default();
        let mut buffer = ChannelBuffer::new(2);
        for text in ["one", "two", "three"] {
            buffer.push(chat_item("bob", text), &snapshot);
        }

        let view = buffer.view(UpstreamStatus::Connected, &snapshot);
        let texts: Vec<_> = view.items.iter().map(|e| e.item.text.as_str()).collect();

        assert_eq!(texts, vec!["two", "three"]);
        assert_eq!(view.first_seq, 1);
        assert_eq!(view.next_seq, 3);
        assert_eq!(view.items[0].seq, 1);
    }

    #[test]
    fn empty_buffer_view_covers_no_items() {
        let buffer = ChannelBuffer::new(5);
        let view = buffer.view(UpstreamStatus::Connected, &RuleSnapshot::default());

        assert_eq!((view.first_seq, view.next_seq), (0, 0));
    }

    #[test]
    fn suppressed_items_stay_buffered_but_hidden() {
        let blocking = RuleSnapshot::new(vec![], vec![BlacklistEntry::new(Pattern::plain("spam"))]);
        let mut buffer = ChannelBuffer::new(10);
        buffer.push(chat_item("bob", "spam!"), &blocking);
        buffer.push(chat_item("bob", "hello"), &blocking);

        let hidden = buffer.view(UpstreamStatus::Connected, &blocking);
        assert_eq!(hidden.items.len(), 1);
        assert_eq!(hidden.first_seq, 0);
        assert_eq!(hidden.items[0].seq, 1);

        let highlighting =
            RuleSnapshot::new(vec![HighlightRule::message(Pattern::plain("spam"))], vec![]);
        buffer.reclassify(&highlighting);
        let view = buffer.view(UpstreamStatus::Connected, &highlighting);

        assert_eq!(view.items.len(), 2);
        assert_eq!(view.highlighted().count(), 1);
    }
}
