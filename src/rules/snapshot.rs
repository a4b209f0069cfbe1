use crate::{
    domain::rule::{normalize_blacklist, normalize_highlights, BlacklistEntry, HighlightRule},
    rules::matcher::PatternMatcher,
};

/// Immutable point-in-time view of every rule. Updates build a new snapshot.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    highlights: Vec<(HighlightRule, PatternMatcher)>,
    blacklist: Vec<(BlacklistEntry, PatternMatcher)>,
    revision: u64,
}

impl RuleSnapshot {
    /// Highlight rules keep their given order; blacklist entries are sorted.
    pub fn new(highlights: Vec<HighlightRule>, blacklist: Vec<BlacklistEntry>) -> Self {
        Self {
            highlights: compile_highlights(highlights),
            blacklist: compile_blacklist(blacklist),
            revision: 0,
        }
    }

    pub fn highlight_rules(&self) -> impl Iterator<Item = &HighlightRule> {
        self.highlights.iter().map(|(rule, _)| rule)
    }

    pub fn blacklist_entries(&self) -> impl Iterator<Item = &BlacklistEntry> {
        self.blacklist.iter().map(|(entry, _)| entry)
    }

    /// Increases by one with every snapshot published by a store.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty() && self.blacklist.is_empty()
    }

    pub(crate) fn with_highlights(&self, highlights: Vec<HighlightRule>) -> Self {
        Self {
            highlights: compile_highlights(highlights),
            blacklist: self.blacklist.clone(),
            revision: self.revision + 1,
        }
    }

    pub(crate) fn with_blacklist(&self, blacklist: Vec<BlacklistEntry>) -> Self {
        Self {
            highlights: self.highlights.clone(),
            blacklist: compile_blacklist(blacklist),
            revision: self.revision + 1,
        }
    }

    pub(crate) fn next_revision(self, previous: &RuleSnapshot) -> Self {
        Self {
            revision: previous.revision + 1,
            ..self
        }
    }

    pub(crate) fn compiled_highlights(
        &self,
    ) -> impl Iterator<Item = (&HighlightRule, &PatternMatcher)> {
        self.highlights.iter().map(|(rule, matcher)| (rule, matcher))
    }

    pub(crate) fn compiled_blacklist(
        &self,
    ) -> impl Iterator<Item = (&BlacklistEntry, &PatternMatcher)> {
        self.blacklist.iter().map(|(entry, matcher)| (entry, matcher))
    }
}

impl PartialEq for RuleSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.highlight_rules().eq(other.highlight_rules())
            && self.blacklist_entries().eq(other.blacklist_entries())
    }
}

fn compile_highlights(rules: Vec<HighlightRule>) -> Vec<(HighlightRule, PatternMatcher)> {
    normalize_highlights(rules)
        .into_iter()
        .map(|rule| {
            let matcher = PatternMatcher::compile(rule.pattern());
            (rule, matcher)
        })
        .collect()
}

fn compile_blacklist(entries: Vec<BlacklistEntry>) -> Vec<(BlacklistEntry, PatternMatcher)> {
    normalize_blacklist(entries)
        .into_iter()
        .map(|entry| {
            let matcher = PatternMatcher::compile(&entry.pattern);
            (entry, matcher)
        })
        .collect()
}
