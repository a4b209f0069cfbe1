use regex::{Regex, RegexBuilder};

use crate::{
    domain::{
        chat_item::ChatItem,
        classification::Classification,
        rule::{HighlightRule, Pattern},
    },
    rules::snapshot::RuleSnapshot,
};

const PATTERN_REGEX_INVALID: &str = "RULES_PATTERN_REGEX_INVALID";

/// Compiled form of a [`Pattern`], built once per snapshot.
#[derive(Debug, Clone)]
pub(crate) enum PatternMatcher {
    /// Lowercased needle for case-insensitive containment.
    Contains(String),
    Regex(Regex),
    /// Invalid regex; degrades to never matching.
    Never,
}

impl PatternMatcher {
    pub(crate) fn compile(pattern: &Pattern) -> Self {
        if !pattern.is_regex() {
            return Self::Contains(pattern.as_str().to_lowercase());
        }

        match RegexBuilder::new(pattern.as_str())
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Self::Regex(regex),
            Err(error) => {
                tracing::warn!(
                    code = PATTERN_REGEX_INVALID,
                    pattern = pattern.as_str(),
                    error = %error,
                    "regex pattern failed to compile; rule will never match"
                );
                Self::Never
            }
        }
    }

    fn is_match(&self, haystack: &Haystack<'_>) -> bool {
        match self {
            Self::Contains(needle) => haystack.folded.contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(haystack.raw),
            Self::Never => false,
        }
    }
}

struct Haystack<'a> {
    raw: &'a str,
    folded: String,
}

impl<'a> Haystack<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            folded: raw.to_lowercase(),
        }
    }
}

/// Classifies an item: blacklist first, then highlight rules in snapshot
/// order, otherwise plain. Total and lock-free.
pub fn classify(item: &ChatItem, snapshot: &RuleSnapshot) -> Classification {
    let text = Haystack::new(&item.text);

    if snapshot
        .compiled_blacklist()
        .any(|(_, matcher)| matcher.is_match(&text))
    {
        return Classification::Suppressed;
    }

    let author = Haystack::new(item.author.as_str());
    snapshot
        .compiled_highlights()
        .find(|(rule, matcher)| match rule {
            HighlightRule::MessagePattern(_) => matcher.is_match(&text),
            HighlightRule::UserPattern(_) => matcher.is_match(&author),
        })
        .map(|(rule, _)| Classification::Highlighted(rule.clone()))
        .unwrap_or(Classification::Plain)
}
