use std::{collections::HashSet, fmt};

/// Pattern text plus its matching mode.
///
/// Plain patterns match as case-insensitive substrings; regex patterns are
/// compiled case-insensitively when a snapshot is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    text: String,
    is_regex: bool,
}

impl Pattern {
    pub fn new(text: impl Into<String>, is_regex: bool) -> Self {
        Self {
            text: text.into(),
            is_regex,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    pub fn regex(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Which field of a chat item a highlight rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HighlightTarget {
    Message,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HighlightRule {
    /// Matches against the item text.
    MessagePattern(Pattern),
    /// Matches against the item author.
    UserPattern(Pattern),
}

impl HighlightRule {
    pub fn message(pattern: Pattern) -> Self {
        Self::MessagePattern(pattern)
    }

    pub fn user(pattern: Pattern) -> Self {
        Self::UserPattern(pattern)
    }

    pub fn with_target(target: HighlightTarget, pattern: Pattern) -> Self {
        match target {
            HighlightTarget::Message => Self::MessagePattern(pattern),
            HighlightTarget::User => Self::UserPattern(pattern),
        }
    }

    pub fn pattern(&self) -> &Pattern {
        match self {
            Self::MessagePattern(pattern) | Self::UserPattern(pattern) => pattern,
        }
    }

    pub fn target(&self) -> HighlightTarget {
        match self {
            Self::MessagePattern(_) => HighlightTarget::Message,
            Self::UserPattern(_) => HighlightTarget::User,
        }
    }

    /// Two rules with the same target and pattern text are one logical rule.
    pub fn identity(&self) -> (HighlightTarget, &str) {
        (self.target(), self.pattern().as_str())
    }
}

/// Suppression rule matched against item text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlacklistEntry {
    pub pattern: Pattern,
}

impl BlacklistEntry {
    pub fn new(pattern: Pattern) -> Self {
        Self { pattern }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Highlights,
    Blacklist,
}

impl RuleKind {
    /// Durable storage slot holding this kind's encoded entries.
    pub fn slot(&self) -> &'static str {
        match self {
            Self::Highlights => "highlights",
            Self::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slot())
    }
}

/// Whole-set replacement for one rule kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSet {
    Highlights(Vec<HighlightRule>),
    Blacklist(Vec<BlacklistEntry>),
}

impl RuleSet {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Highlights(_) => RuleKind::Highlights,
            Self::Blacklist(_) => RuleKind::Blacklist,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Highlights(rules) => rules.len(),
            Self::Blacklist(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops blank patterns and duplicates. Highlight rules keep their
    /// order; blacklist entries come back sorted by pattern.
    pub fn normalized(self) -> Self {
        match self {
            Self::Highlights(rules) => Self::Highlights(normalize_highlights(rules)),
            Self::Blacklist(entries) => Self::Blacklist(normalize_blacklist(entries)),
        }
    }
}

pub(crate) fn normalize_highlights(rules: Vec<HighlightRule>) -> Vec<HighlightRule> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| !rule.pattern().is_blank())
        .filter(|rule| {
            let (target, text) = rule.identity();
            seen.insert((target, text.to_owned()))
        })
        .collect()
}

pub(crate) fn normalize_blacklist(entries: Vec<BlacklistEntry>) -> Vec<BlacklistEntry> {
    let mut seen = HashSet::new();
    let mut entries: Vec<_> = entries
        .into_iter()
        .filter(|entry| !entry.pattern.is_blank())
        .filter(|entry| seen.insert(entry.pattern.as_str().to_owned()))
        .collect();
    entries.sort_by(|a, b| a.pattern.as_str().cmp(b.pattern.as_str()));
    entries
}
