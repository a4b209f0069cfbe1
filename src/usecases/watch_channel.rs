use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin},
    sync::mpsc,
};

use crate::{
    domain::{
        chat_item::{ChannelId, ChatItem, UserId},
        view::{ChannelView, ClassifiedItem, UpstreamStatus},
    },
    hub::{upstream_channel, ChannelStreamHub, ChatSource, ChatSourceError},
};

const LINE_SOURCE_READ_FAILED: &str = "LINE_SOURCE_READ_FAILED";
const LINE_SOURCE_LINE_SKIPPED: &str = "LINE_SOURCE_LINE_SKIPPED";
const LINE_SOURCE_CAPACITY: usize = 256;
const WATCH_ITEMS_SKIPPED: &str = "WATCH_ITEMS_SKIPPED";

/// Upstream fed by `author: text` lines. The reader can only be consumed
/// once; later connects are rejected.
pub struct LineChatSource<R> {
    reader: Mutex<Option<R>>,
}

impl<R> LineChatSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
        }
    }
}

impl LineChatSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> ChatSource for LineChatSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn connect(&self, channel: &ChannelId) -> Result<mpsc::Receiver<ChatItem>, ChatSourceError> {
        let reader = self
            .reader
            .lock()
            .ok()
            .and_then(|mut reader| reader.take())
            .ok_or(ChatSourceError::Unavailable)?;

        let (tx, rx) = upstream_channel(LINE_SOURCE_CAPACITY);
        let channel = channel.clone();
        tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(item) = parse_line(&channel, &line) else {
                            tracing::debug!(code = LINE_SOURCE_LINE_SKIPPED, "input line skipped");
                            continue;
                        };
                        if tx.send(item).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(error) => {
                        tracing::warn!(
                            code = LINE_SOURCE_READ_FAILED,
                            error = %error,
                            "line source read failed"
                        );
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Parses `author: text`. Lines without an author are skipped.
pub fn parse_line(channel: &ChannelId, line: &str) -> Option<ChatItem> {
    let (author, text) = line.split_once(':')?;
    let author = author.trim();
    if author.is_empty() || author.contains(char::is_whitespace) {
        return None;
    }

    Some(ChatItem::new(
        channel.clone(),
        UserId::new(author),
        text.trim(),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSummary {
    pub printed: usize,
    /// Upstream items that scrolled out of the view before they could be
    /// printed. Suppressed items among them are counted too.
    pub skipped: u64,
    pub status: UpstreamStatus,
}

/// Prints every newly visible item until the upstream disconnects. Items
/// that scroll out between two views are reported as a skip notice.
pub async fn watch_channel<W: Write>(
    hub: &ChannelStreamHub,
    channel: ChannelId,
    out: &mut W,
) -> Result<WatchSummary> {
    let mut subscription = hub.subscribe(channel.clone());
    let mut seen = 0;
    let mut summary = WatchSummary {
        printed: 0,
        skipped: 0,
        status: UpstreamStatus::Connecting,
    };

    while let Some(view) = subscription.next().await {
        let skipped = view.first_seq.saturating_sub(seen);
        if skipped > 0 {
            tracing::warn!(
                code = WATCH_ITEMS_SKIPPED,
                channel = %channel,
                skipped,
                "items scrolled out before they were printed"
            );
            writeln!(out, "-- {skipped} items skipped --")?;
            summary.skipped += skipped;
        }

        for entry in fresh_entries(&view, seen) {
            writeln!(out, "{}", render_entry(entry))?;
            summary.printed += 1;
        }
        out.flush()?;

        seen = seen.max(view.next_seq);
        summary.status = view.status;
        if view.status == UpstreamStatus::Disconnected {
            break;
        }
    }

    Ok(summary)
}

/// Visible items at or after sequence number `seen`.
fn fresh_entries(view: &ChannelView, seen: u64) -> &[ClassifiedItem] {
    let start = view.items.partition_point(|entry| entry.seq < seen);
    &view.items[start..]
}

pub fn render_entry(entry: &ClassifiedItem) -> String {
    let marker = if entry.classification.highlighted_by().is_some() {
        "* "
    } else {
        ""
    };

    format!(
        "{} {}{}: {}",
        entry.item.timestamp.format("%H:%M:%S"),
        marker,
        entry.item.author,
        entry.item.text
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::runtime::Handle;

    use super::*;
    use crate::{
        domain::{
            classification::Classification,
            rule::{BlacklistEntry, HighlightRule, Pattern, RuleSet},
        },
        hub::HubOptions,
        infra::stubs::MemoryKeyValueStore,
        rules::RuleStore,
    };

    #[test]
    fn parses_author_and_text() {
        let item = parse_line(&"forsen".into(), "alice:  hello: world ").expect("should parse");

        assert_eq!(item.author.as_str(), "alice");
        assert_eq!(item.text, "hello: world");
        assert_eq!(item.channel.as_str(), "forsen");
    }

    #[test]
    fn skips_lines_without_author() {
        let channel = ChannelId::from("forsen");

        assert!(parse_line(&channel, "no separator").is_none());
        assert!(parse_line(&channel, ": empty author").is_none());
        assert!(parse_line(&channel, "two words: nope").is_none());
    }

    #[test]
    fn fresh_entries_start_at_first_unseen_sequence() {
        let entry = |seq: u64, text: &str| ClassifiedItem {
            item: Arc::new(ChatItem::new("c".into(), "bob".into(), text)),
            classification: Classification::Plain,
            seq,
        };
        // seq 2 was suppressed and is absent from the view.
        let view = ChannelView {
            items: Arc::new(vec![entry(0, "a"), entry(1, "b"), entry(3, "d")]),
            next_seq: 4,
            ..ChannelView::default()
        };
        let texts = |seen| -> Vec<String> {
            fresh_entries(&view, seen)
                .iter()
                .map(|entry| entry.item.text.clone())
                .collect()
        };

        assert_eq!(texts(0), vec!["a", "b", "d"]);
        assert_eq!(texts(1), vec!["b", "d"]);
        assert_eq!(texts(2), vec!["d"]);
        assert!(texts(4).is_empty());
    }

    #[test]
    fn highlighted_entries_are_marked() {
        let entry = ClassifiedItem {
            item: Arc::new(ChatItem::new("c".into(), "mod123".into(), "hello")),
            classification: Classification::Highlighted(HighlightRule::user(Pattern::plain(
                "mod123",
            ))),
            seq: 0,
        };

        assert!(render_entry(&entry).ends_with(" * mod123: hello"));
    }

    #[tokio::test]
    async fn watch_prints_visible_lines_until_input_ends() {
        let rules = Arc::new(RuleStore::new(Arc::new(MemoryKeyValueStore::new())));
        rules
            .commit(RuleSet::Blacklist(vec![BlacklistEntry::new(Pattern::plain("spam"))]))
            .expect("blacklist commit");
        rules
            .commit(RuleSet::Highlights(vec![HighlightRule::user(Pattern::plain("mod123"))]))
            .expect("highlight commit");
        let input: &'static [u8] = b"alice: hi\nbob: buy spam\nnot a chat line\nmod123: hello\n";
        let hub = ChannelStreamHub::new(
            Arc::new(LineChatSource::new(input)),
            rules,
            HubOptions {
                idle_timeout: Duration::from_millis(10),
                scrollback: 100,
            },
            Handle::current(),
        );
        let mut out = Vec::new();

        let summary = tokio::time::timeout(
            Duration::from_secs(2),
            watch_channel(&hub, "forsen".into(), &mut out),
        )
        .await
        .expect("watch should finish when input ends")
        .expect("watch should succeed");

        let printed = String::from_utf8(out).expect("utf8 output");
        let lines: Vec<_> = printed.lines().collect();
        assert_eq!(summary.status, UpstreamStatus::Disconnected);
        assert_eq!(summary.printed, 2);
        assert_eq!(summary.skipped, 0);
        assert!(lines[0].ends_with(" alice: hi"));
        assert!(lines[1].ends_with(" * mod123: hello"));
        assert!(!printed.contains("spam"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn burst_larger_than_scrollback_accounts_for_every_line() {
        const LINES: usize = 5000;
        let input: String = (0..LINES).map(|n| format!("bob: line {n}\n")).collect();
        let input: &'static [u8] = Box::leak(input.into_bytes().into_boxed_slice());
        let rules = Arc::new(RuleStore::new(Arc::new(MemoryKeyValueStore::new())));
        let hub = ChannelStreamHub::new(
            Arc::new(LineChatSource::new(input)),
            rules,
            HubOptions {
                idle_timeout: Duration::from_millis(10),
                scrollback: 20,
            },
            Handle::current(),
        );
        let mut out = Vec::new();

        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            watch_channel(&hub, "forsen".into(), &mut out),
        )
        .await
        .expect("watch should finish when input ends")
        .expect("watch should succeed");

        assert_eq!(summary.status, UpstreamStatus::Disconnected);
        assert_eq!(summary.printed + summary.skipped as usize, LINES);

        let printed = String::from_utf8(out).expect("utf8 output");
        let numbers: Vec<usize> = printed
            .lines()
            .filter_map(|line| line.rsplit_once("line ")?.1.parse().ok())
            .collect();
        assert_eq!(numbers.len(), summary.printed);
        assert!(numbers.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(numbers.last(), Some(&(LINES - 1)));
        if summary.skipped > 0 {
            assert!(printed.contains("items skipped --"));
        }
    }
}
