//! Durable string form of rules.
//!
//! Each entry is one JSON object:
//!
//! ```text
//! {"entry":"mod123","isRegex":false,"matchUser":true}
//! ```
//!
//! `matchUser` only exists on highlight records. Unknown fields are ignored
//! and missing flags default to `false`, so newer writers stay readable.

use serde::Deserialize;
use serde_json::json;

use crate::domain::rule::{BlacklistEntry, HighlightRule, Pattern};

const RULE_ENTRY_DECODE_FAILED: &str = "RULES_ENTRY_DECODE_FAILED";

/// Conversion between a rule and its persisted record.
pub trait RuleCodec: Sized {
    fn encode(&self) -> String;

    /// Malformed or blank records yield `None`; never fails loudly.
    fn decode(raw: &str) -> Option<Self>;
}

#[derive(Debug, Deserialize)]
struct EntryRecord {
    entry: String,
    #[serde(rename = "isRegex", default)]
    is_regex: bool,
    #[serde(rename = "matchUser", default)]
    match_user: bool,
}

impl EntryRecord {
    fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<EntryRecord>(raw) {
            Ok(record) if record.entry.trim().is_empty() => {
                tracing::debug!(code = RULE_ENTRY_DECODE_FAILED, "dropping blank rule entry");
                None
            }
            Ok(record) => Some(record),
            Err(error) => {
                tracing::debug!(
                    code = RULE_ENTRY_DECODE_FAILED,
                    error = %error,
                    "dropping malformed rule entry"
                );
                None
            }
        }
    }

    fn pattern(self) -> Pattern {
        Pattern::new(self.entry, self.is_regex)
    }
}

impl RuleCodec for HighlightRule {
    fn encode(&self) -> String {
        let pattern = self.pattern();
        json!({
            "entry": pattern.as_str(),
            "isRegex": pattern.is_regex(),
            "matchUser": matches!(self, HighlightRule::UserPattern(_)),
        })
        .to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        let record = EntryRecord::parse(raw)?;
        let match_user = record.match_user;
        let pattern = record.pattern();

        Some(if match_user {
            HighlightRule::UserPattern(pattern)
        } else {
            HighlightRule::MessagePattern(pattern)
        })
    }
}

impl RuleCodec for BlacklistEntry {
    fn encode(&self) -> String {
        json!({
            "entry": self.pattern.as_str(),
            "isRegex": self.pattern.is_regex(),
        })
        .to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        EntryRecord::parse(raw).map(|record| BlacklistEntry::new(record.pattern()))
    }
}

/// Decodes every record, silently skipping the ones that fail.
pub fn decode_all<R: RuleCodec>(raw: &[String]) -> Vec<R> {
    raw.iter().filter_map(|record| R::decode(record)).collect()
}

pub fn encode_all<R: RuleCodec>(rules: &[R]) -> Vec<String> {
    rules.iter().map(RuleCodec::encode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_rules_survive_encoding() {
        let rules = [
            HighlightRule::message(Pattern::plain("urgent")),
            HighlightRule::user(Pattern::regex(r"^mod\d+$")),
        ];

        for rule in rules {
            assert_eq!(HighlightRule::decode(&rule.encode()), Some(rule));
        }
    }

    #[test]
    fn blacklist_entry_survives_encoding() {
        let entry = BlacklistEntry::new(Pattern::regex("sp[a4]m"));

        assert_eq!(BlacklistEntry::decode(&entry.encode()), Some(entry));
    }

    #[test]
    fn blacklist_records_omit_match_user() {
        let encoded = BlacklistEntry::new(Pattern::plain("spam")).encode();

        assert!(!encoded.contains("matchUser"));
        assert!(encoded.contains("\"entry\":\"spam\""));
    }

    #[test]
    fn decodes_records_written_with_unknown_fields() {
        let raw = r#"{"entry":"alice","isRegex":false,"matchUser":true,"sound":"ding","v":2}"#;

        assert_eq!(
            HighlightRule::decode(raw),
            Some(HighlightRule::user(Pattern::plain("alice")))
        );
    }

    #[test]
    fn missing_flags_default_to_plain_message_rule() {
        assert_eq!(
            HighlightRule::decode(r#"{"entry":"hey"}"#),
            Some(HighlightRule::message(Pattern::plain("hey")))
        );
    }

    #[test]
    fn malformed_records_decode_to_nothing() {
        let inputs = [
            "",
            "spam",
            "{",
            "[]",
            "null",
            r#"{"isRegex":true}"#,
            r#"{"entry":42}"#,
            r#"{"entry":"   "}"#,
            r#"{"entry":"x","isRegex":"yes"}"#,
        ];

        for raw in inputs {
            assert_eq!(HighlightRule::decode(raw), None, "input: {raw:?}");
            assert_eq!(BlacklistEntry::decode(raw), None, "input: {raw:?}");
        }
    }

    #[test]
    fn decode_all_skips_bad_records_and_keeps_order() {
        let raw = vec![
            r#"{"entry":"b"}"#.to_owned(),
            "garbage".to_owned(),
            r#"{"entry":"a","matchUser":true}"#.to_owned(),
        ];

        let rules: Vec<HighlightRule> = decode_all(&raw);

        assert_eq!(
            rules,
            vec![
                HighlightRule::message(Pattern::plain("b")),
                HighlightRule::user(Pattern::plain("a")),
            ]
        );
    }
}
