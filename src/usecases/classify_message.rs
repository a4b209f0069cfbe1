use crate::{
    domain::{
        chat_item::{ChannelId, ChatItem, UserId},
        classification::Classification,
    },
    rules::{classify, RuleStore},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifyQuery {
    pub channel: ChannelId,
    pub author: UserId,
    pub text: String,
}

/// Classifies one ad-hoc message against the current rules.
pub fn classify_message(store: &RuleStore, query: ClassifyQuery) -> Classification {
    let item = ChatItem::new(query.channel, query.author, query.text);
    classify(&item, &store.load())
}
