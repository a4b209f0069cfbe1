use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::chat_item::ChatItem;

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn chat_item(author: &str, text: &str) -> ChatItem {
    ChatItem::new("forsen".into(), author.into(), text)
}
