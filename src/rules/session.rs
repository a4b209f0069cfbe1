use std::sync::Arc;

use crate::{
    domain::rule::{BlacklistEntry, HighlightRule, HighlightTarget, Pattern, RuleKind, RuleSet},
    rules::{
        snapshot::RuleSnapshot,
        store::{RuleStore, StoreError},
    },
};

/// A rule kind that can be staged in a [`WorkingSet`].
pub trait EditableRule: Clone {
    const KIND: RuleKind;

    fn pattern(&self) -> &Pattern;

    fn seed(snapshot: &RuleSnapshot) -> Vec<Self>;

    fn into_rule_set(entries: Vec<Self>) -> RuleSet;
}

impl EditableRule for HighlightRule {
    const KIND: RuleKind = RuleKind::Highlights;

    fn pattern(&self) -> &Pattern {
        HighlightRule::pattern(self)
    }

    fn seed(snapshot: &RuleSnapshot) -> Vec<Self> {
        snapshot.highlight_rules().cloned().collect()
    }

    /// Message rules are committed ahead of user rules, each tab keeping
    /// its own order. Matching therefore tries message rules first.
    fn into_rule_set(entries: Vec<Self>) -> RuleSet {
        let (mut rules, users): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|rule| rule.target() == HighlightTarget::Message);
        rules.extend(users);
        RuleSet::Highlights(rules)
    }
}

impl EditableRule for BlacklistEntry {
    const KIND: RuleKind = RuleKind::Blacklist;

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn seed(snapshot: &RuleSnapshot) -> Vec<Self> {
        snapshot.blacklist_entries().cloned().collect()
    }

    fn into_rule_set(entries: Vec<Self>) -> RuleSet {
        RuleSet::Blacklist(entries)
    }
}

/// Handle to a staged entry, stable across other adds and removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

/// Isolated in-memory copy of one rule kind. Nothing is persisted until it
/// is passed to [`HighlightSession::commit`]; dropping it discards edits.
#[derive(Debug, Clone)]
pub struct WorkingSet<R> {
    entries: Vec<(EntryId, R)>,
    next_id: u64,
}

impl<R: EditableRule> WorkingSet<R> {
    fn seeded(entries: Vec<R>) -> Self {
        let mut working_set = Self {
            entries: Vec::with_capacity(entries.len()),
            next_id: 0,
        };
        for entry in entries {
            working_set.add(entry);
        }
        working_set
    }

    pub fn kind(&self) -> RuleKind {
        R::KIND
    }

    pub fn add(&mut self, entry: R) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, entry));
        id
    }

    pub fn remove(&mut self, id: EntryId) -> Option<R> {
        let position = self.entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        Some(self.entries.remove(position).1)
    }

    /// Swaps the entry in place. Returns `false` for unknown ids.
    pub fn replace(&mut self, id: EntryId, entry: R) -> bool {
        match self.entries.iter_mut().find(|(entry_id, _)| *entry_id == id) {
            Some(slot) => {
                slot.1 = entry;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EntryId) -> Option<&R> {
        self.entries
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, entry)| entry)
    }

    pub fn find(&self, pattern: &str) -> Option<EntryId> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.pattern().as_str() == pattern)
            .map(|(id, _)| *id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (EntryId, &R)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_rule_set(&self) -> RuleSet {
        R::into_rule_set(self.entries.iter().map(|(_, entry)| entry.clone()).collect())
    }
}

impl WorkingSet<HighlightRule> {
    pub fn add_message(&mut self, pattern: Pattern) -> EntryId {
        self.add(HighlightRule::message(pattern))
    }

    pub fn add_user(&mut self, pattern: Pattern) -> EntryId {
        self.add(HighlightRule::user(pattern))
    }

    /// Entries shown on one editor tab.
    pub fn tab(&self, target: HighlightTarget) -> impl Iterator<Item = (EntryId, &HighlightRule)> {
        self.entries().filter(move |(_, rule)| rule.target() == target)
    }

    pub fn find_in_tab(&self, target: HighlightTarget, pattern: &str) -> Option<EntryId> {
        self.tab(target)
            .find(|(_, rule)| rule.pattern().as_str() == pattern)
            .map(|(id, _)| id)
    }
}

impl WorkingSet<BlacklistEntry> {
    pub fn add_pattern(&mut self, pattern: Pattern) -> EntryId {
        self.add(BlacklistEntry::new(pattern))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub kind: RuleKind,
    pub kept: usize,
    /// Blank or duplicate entries left out of the commit.
    pub discarded: usize,
}

/// Editing sessions over a shared [`RuleStore`].
#[derive(Debug, Clone)]
pub struct HighlightSession {
    store: Arc<RuleStore>,
}

impl HighlightSession {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }

    pub fn open<R: EditableRule>(&self) -> WorkingSet<R> {
        WorkingSet::seeded(R::seed(&self.store.load()))
    }

    pub fn open_highlights(&self) -> WorkingSet<HighlightRule> {
        self.open()
    }

    pub fn open_blacklist(&self) -> WorkingSet<BlacklistEntry> {
        self.open()
    }

    /// Filters, deduplicates and writes the working set in one commit. The
    /// working set is left intact so a failed commit can be retried.
    pub fn commit<R: EditableRule>(
        &self,
        working_set: &WorkingSet<R>,
    ) -> Result<CommitSummary, StoreError> {
        let staged = working_set.len();
        let rule_set = working_set.to_rule_set().normalized();
        let kept = rule_set.len();

        self.store.commit(rule_set)?;

        Ok(CommitSummary {
            kind: R::KIND,
            kept,
            discarded: staged - kept,
        })
    }
}
