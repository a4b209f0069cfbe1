use std::fmt;

use chrono::{DateTime, Utc};

/// Name of a chat room; items and hub connections are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One unit of chat content produced upstream. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatItem {
    pub channel: ChannelId,
    pub author: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatItem {
    /// Builds an item stamped with the current time.
    pub fn new(channel: ChannelId, author: UserId, text: impl Into<String>) -> Self {
        Self {
            channel,
            author,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}
