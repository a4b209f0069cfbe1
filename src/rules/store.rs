use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

use crate::{
    domain::rule::{BlacklistEntry, HighlightRule, RuleKind, RuleSet},
    infra::{contracts::KeyValueStore, error::StorageError},
    rules::{
        codec::{decode_all, encode_all},
        snapshot::RuleSnapshot,
    },
};

const RULES_LOAD_FAILED: &str = "RULES_LOAD_FAILED";
const RULES_LOADED: &str = "RULES_LOADED";
const RULES_COMMIT_FAILED: &str = "RULES_COMMIT_FAILED";
const RULES_COMMITTED: &str = "RULES_COMMITTED";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rule storage unavailable for {kind}: {source}")]
    Unavailable {
        kind: RuleKind,
        #[source]
        source: StorageError,
    },
}

/// Owner of the live [`RuleSnapshot`].
///
/// The snapshot is read from durable storage on first access and replaced
/// on every successful commit. Commits to the same kind are serialized;
/// the two kinds commit independently.
pub struct RuleStore {
    storage: Arc<dyn KeyValueStore>,
    state: Mutex<StoreState>,
    highlights_write: Mutex<()>,
    blacklist_write: Mutex<()>,
    snapshot_tx: watch::Sender<Arc<RuleSnapshot>>,
}

#[derive(Default)]
struct StoreState {
    snapshot: Arc<RuleSnapshot>,
    loaded: bool,
    subscribers: Vec<mpsc::Sender<Arc<RuleSnapshot>>>,
}

impl RuleStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(RuleSnapshot::default()));
        Self {
            storage,
            state: Mutex::new(StoreState::default()),
            highlights_write: Mutex::new(()),
            blacklist_write: Mutex::new(()),
            snapshot_tx,
        }
    }

    /// Current snapshot. Undecodable entries are dropped; if storage cannot
    /// be read at all, the in-memory snapshot is returned and the read is
    /// retried on the next access.
    pub fn load(&self) -> Arc<RuleSnapshot> {
        let mut state = self.lock_state();
        self.ensure_loaded(&mut state);
        Arc::clone(&state.snapshot)
    }

    /// Blocking stream of snapshots: the current one first, then one per
    /// commit. Dropping the receiver unsubscribes.
    pub fn snapshot_updates(&self) -> mpsc::Receiver<Arc<RuleSnapshot>> {
        let (tx, rx) = mpsc::channel();
        let mut state = self.lock_state();
        self.ensure_loaded(&mut state);
        if tx.send(Arc::clone(&state.snapshot)).is_ok() {
            state.subscribers.push(tx);
        }
        rx
    }

    /// Latest-value handle for async consumers.
    pub fn watch(&self) -> watch::Receiver<Arc<RuleSnapshot>> {
        let mut state = self.lock_state();
        self.ensure_loaded(&mut state);
        self.snapshot_tx.subscribe()
    }

    /// Atomically replaces the stored set for the rule set's kind and
    /// publishes the resulting snapshot. On failure the previous snapshot
    /// stays current.
    pub fn commit(&self, rule_set: RuleSet) -> Result<Arc<RuleSnapshot>, StoreError> {
        let kind = rule_set.kind();
        let _write_guard = self
            .write_lock(kind)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        {
            let mut state = self.lock_state();
            self.ensure_loaded(&mut state);
        }

        let rule_set = rule_set.normalized();
        let encoded = match &rule_set {
            RuleSet::Highlights(rules) => encode_all(rules),
            RuleSet::Blacklist(entries) => encode_all(entries),
        };

        if let Err(source) = self.storage.write_set(kind.slot(), &encoded) {
            tracing::warn!(
                code = RULES_COMMIT_FAILED,
                kind = %kind,
                error = %source,
                "rule commit failed; keeping previous snapshot"
            );
            return Err(StoreError::Unavailable { kind, source });
        }

        let mut state = self.lock_state();
        let next = match rule_set {
            RuleSet::Highlights(rules) => state.snapshot.with_highlights(rules),
            RuleSet::Blacklist(entries) => state.snapshot.with_blacklist(entries),
        };
        tracing::info!(
            code = RULES_COMMITTED,
            kind = %kind,
            entries = encoded.len(),
            revision = next.revision(),
            "rules committed"
        );
        Ok(self.publish(&mut state, next))
    }

    fn write_lock(&self, kind: RuleKind) -> &Mutex<()> {
        match kind {
            RuleKind::Highlights => &self.highlights_write,
            RuleKind::Blacklist => &self.blacklist_write,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_loaded(&self, state: &mut StoreState) {
        if state.loaded {
            return;
        }

        match self.read_snapshot() {
            Ok(loaded) => {
                let loaded = loaded.next_revision(&state.snapshot);
                tracing::debug!(
                    code = RULES_LOADED,
                    highlights = loaded.highlight_rules().count(),
                    blacklist = loaded.blacklist_entries().count(),
                    "rules loaded from storage"
                );
                state.loaded = true;
                self.publish(state, loaded);
            }
            Err(error) => {
                tracing::warn!(
                    code = RULES_LOAD_FAILED,
                    error = %error,
                    "rule storage unreadable; serving in-memory rules"
                );
            }
        }
    }

    fn read_snapshot(&self) -> Result<RuleSnapshot, StorageError> {
        let highlights = self.storage.read_set(RuleKind::Highlights.slot())?;
        let blacklist = self.storage.read_set(RuleKind::Blacklist.slot())?;

        Ok(RuleSnapshot::new(
            decode_all::<HighlightRule>(&highlights),
            decode_all::<BlacklistEntry>(&blacklist),
        ))
    }

    fn publish(&self, state: &mut StoreState, next: RuleSnapshot) -> Arc<RuleSnapshot> {
        let next = Arc::new(next);
        state.snapshot = Arc::clone(&next);
        state
            .subscribers
            .retain(|sub| sub.send(Arc::clone(&next)).is_ok());
        self.snapshot_tx.send_replace(Arc::clone(&next));
        next
    }
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("RuleStore")
            .field("loaded", &state.loaded)
            .field("revision", &state.snapshot.revision())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{
        domain::{classification::Classification, rule::Pattern},
        infra::stubs::MemoryKeyValueStore,
        rules::{codec::RuleCodec, matcher::classify},
        test_support::chat_item,
    };

    fn store_with(storage: MemoryKeyValueStore) -> (Arc<MemoryKeyValueStore>, RuleStore) {
        let storage = Arc::new(storage);
        let store = RuleStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn load_drops_malformed_entries_and_sorts_blacklist() {
        let (_, store) = store_with(
            MemoryKeyValueStore::new()
                .with_slot(
                    "highlights",
                    &[r#"{"entry":"zeta"}"#, "broken", r#"{"entry":"alpha","matchUser":true}"#],
                )
                .with_slot("blacklist", &[r#"{"entry":"spam"}"#, "{", r#"{"entry":"ads"}"#]),
        );

        let snapshot = store.load();

        assert_eq!(
            snapshot.highlight_rules().cloned().collect::<Vec<_>>(),
            vec![
                HighlightRule::message(Pattern::plain("zeta")),
                HighlightRule::user(Pattern::plain("alpha")),
            ]
        );
        assert_eq!(
            snapshot
                .blacklist_entries()
                .map(|entry| entry.pattern.as_str().to_owned())
                .collect::<Vec<_>>(),
            vec!["ads", "spam"]
        );
    }

    #[test]
    fn commit_persists_encoded_entries_without_blanks() {
        let (storage, store) = store_with(MemoryKeyValueStore::new());

        store
            .commit(RuleSet::Blacklist(vec![
                BlacklistEntry::new(Pattern::plain("spam")),
                BlacklistEntry::new(Pattern::plain("  ")),
            ]))
            .expect("commit should succeed");

        let persisted = storage.read_set("blacklist").expect("read");
        assert_eq!(persisted, vec![BlacklistEntry::new(Pattern::plain("spam")).encode()]);
        assert!(storage.read_set("highlights").expect("read").is_empty());
    }

    #[test]
    fn commit_is_visible_to_the_next_load() {
        let (_, store) = store_with(MemoryKeyValueStore::new());
        let before = store.load();

        let committed = store
            .commit(RuleSet::Highlights(vec![HighlightRule::user(Pattern::plain("mod123"))]))
            .expect("commit should succeed");

        let after = store.load();
        assert!(after.revision() > before.revision());
        assert_eq!(after, committed);
        assert_eq!(after.highlight_rules().count(), 1);
    }

    #[test]
    fn commit_of_one_kind_keeps_the_other() {
        let (_, store) = store_with(MemoryKeyValueStore::new());
        store
            .commit(RuleSet::Blacklist(vec![BlacklistEntry::new(Pattern::plain("spam"))]))
            .expect("blacklist commit");
        store
            .commit(RuleSet::Highlights(vec![HighlightRule::message(Pattern::plain("hi"))]))
            .expect("highlight commit");

        let snapshot = store.load();
        assert_eq!(snapshot.blacklist_entries().count(), 1);
        assert_eq!(snapshot.highlight_rules().count(), 1);
    }

    #[test]
    fn failed_commit_keeps_previous_snapshot() {
        let (storage, store) = store_with(MemoryKeyValueStore::new());
        store
            .commit(RuleSet::Blacklist(vec![BlacklistEntry::new(Pattern::plain("spam"))]))
            .expect("initial commit");
        let before = store.load();

        storage.set_offline(true);
        let error = store
            .commit(RuleSet::Blacklist(vec![]))
            .expect_err("commit must fail while offline");

        assert!(matches!(
            error,
            StoreError::Unavailable {
                kind: RuleKind::Blacklist,
                source: StorageError::Offline
            }
        ));
        assert_eq!(store.load(), before);
        assert_eq!(store.load().revision(), before.revision());
    }

    #[test]
    fn unreadable_storage_serves_empty_rules_and_retries() {
        let (storage, store) = store_with(
            MemoryKeyValueStore::new().with_slot("blacklist", &[r#"{"entry":"spam"}"#]),
        );
        storage.set_offline(true);

        assert!(store.load().is_empty());

        storage.set_offline(false);
        assert_eq!(store.load().blacklist_entries().count(), 1);
    }

    #[test]
    fn snapshot_updates_emit_current_then_each_commit() {
        let (_, store) = store_with(
            MemoryKeyValueStore::new().with_slot("blacklist", &[r#"{"entry":"spam"}"#]),
        );
        let updates = store.snapshot_updates();

        let initial = updates.recv().expect("initial snapshot should be sent");
        assert_eq!(initial.blacklist_entries().count(), 1);

        store
            .commit(RuleSet::Highlights(vec![HighlightRule::user(Pattern::plain("a"))]))
            .expect("commit 1");
        store
            .commit(RuleSet::Blacklist(vec![]))
            .expect("commit 2");

        let first = updates.recv().expect("first commit");
        let second = updates.recv().expect("second commit");
        assert_eq!(first.highlight_rules().count(), 1);
        assert_eq!(first.blacklist_entries().count(), 1);
        assert_eq!(second.blacklist_entries().count(), 0);
        assert!(second.revision() > first.revision());
    }

    #[test]
    fn dropped_subscribers_are_pruned_on_publish() {
        let (_, store) = store_with(MemoryKeyValueStore::new());
        drop(store.snapshot_updates());

        store.commit(RuleSet::Blacklist(vec![])).expect("commit");

        assert!(store.lock_state().subscribers.is_empty());
    }

    #[test]
    fn watch_observes_latest_commit() {
        let (_, store) = store_with(MemoryKeyValueStore::new());
        let watcher = store.watch();

        store
            .commit(RuleSet::Blacklist(vec![BlacklistEntry::new(Pattern::plain("x"))]))
            .expect("commit");

        assert!(watcher.has_changed().expect("sender alive"));
        assert_eq!(watcher.borrow().blacklist_entries().count(), 1);
    }

    #[test]
    fn concurrent_commits_to_both_kinds_are_not_lost() {
        let (_, store) = store_with(MemoryKeyValueStore::new());
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let set = if n % 2 == 0 {
                        RuleSet::Highlights(vec![HighlightRule::message(Pattern::plain(
                            format!("h{n}"),
                        ))])
                    } else {
                        RuleSet::Blacklist(vec![BlacklistEntry::new(Pattern::plain(
                            format!("b{n}"),
                        ))])
                    };
                    store.commit(set).expect("commit should succeed");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("commit thread");
        }

        let snapshot = store.load();
        assert_eq!(snapshot.highlight_rules().count(), 1);
        assert_eq!(snapshot.blacklist_entries().count(), 1);
    }

    #[test]
    fn blacklist_then_user_highlight_scenario() {
        let (_, store) = store_with(MemoryKeyValueStore::new());

        store
            .commit(RuleSet::Blacklist(vec![BlacklistEntry::new(Pattern::plain("spam"))]))
            .expect("blacklist commit");
        assert_eq!(
            classify(&chat_item("bob", "this is spam content"), &store.load()),
            Classification::Suppressed
        );

        store
            .commit(RuleSet::Highlights(vec![HighlightRule::user(Pattern::plain("mod123"))]))
            .expect("highlight commit");
        let snapshot = store.load();

        assert_eq!(
            classify(&chat_item("mod123", "hello"), &snapshot),
            Classification::Highlighted(HighlightRule::user(Pattern::plain("mod123")))
        );
        assert_eq!(
            classify(&chat_item("mod123", "buy spam now"), &snapshot),
            Classification::Suppressed
        );
    }
}
