use thiserror::Error;

use crate::{
    domain::rule::{HighlightTarget, Pattern},
    rules::{HighlightSession, RuleStore, StoreError},
};

/// Editor list an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Message,
    User,
    Blacklist,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleListing {
    pub message: Vec<Pattern>,
    pub user: Vec<Pattern>,
    pub blacklist: Vec<Pattern>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Added,
    AlreadyPresent,
    Removed,
    NotFound,
}

#[derive(Debug, Error)]
pub enum EditRulesError {
    #[error("pattern must not be blank")]
    BlankPattern,
    #[error("changes not saved: {0}")]
    NotSaved(#[from] StoreError),
}

pub fn list_rules(store: &RuleStore) -> RuleListing {
    let snapshot = store.load();
    let mut listing = RuleListing::default();

    for rule in snapshot.highlight_rules() {
        match rule.target() {
            HighlightTarget::Message => listing.message.push(rule.pattern().clone()),
            HighlightTarget::User => listing.user.push(rule.pattern().clone()),
        }
    }
    listing.blacklist = snapshot
        .blacklist_entries()
        .map(|entry| entry.pattern.clone())
        .collect();

    listing
}

/// Adds one pattern through a single-edit session.
pub fn add_rule(
    sessions: &HighlightSession,
    target: RuleTarget,
    pattern: Pattern,
) -> Result<EditOutcome, EditRulesError> {
    if pattern.is_blank() {
        return Err(EditRulesError::BlankPattern);
    }

    match target {
        RuleTarget::Message | RuleTarget::User => {
            let tab = highlight_tab(target);
            let mut working_set = sessions.open_highlights();
            if working_set.find_in_tab(tab, pattern.as_str()).is_some() {
                return Ok(EditOutcome::AlreadyPresent);
            }
            match tab {
                HighlightTarget::Message => working_set.add_message(pattern),
                HighlightTarget::User => working_set.add_user(pattern),
            };
            sessions.commit(&working_set)?;
        }
        RuleTarget::Blacklist => {
            let mut working_set = sessions.open_blacklist();
            if working_set.find(pattern.as_str()).is_some() {
                return Ok(EditOutcome::AlreadyPresent);
            }
            working_set.add_pattern(pattern);
            sessions.commit(&working_set)?;
        }
    }

    Ok(EditOutcome::Added)
}

pub fn remove_rule(
    sessions: &HighlightSession,
    target: RuleTarget,
    pattern: &str,
) -> Result<EditOutcome, EditRulesError> {
    match target {
        RuleTarget::Message | RuleTarget::User => {
            let mut working_set = sessions.open_highlights();
            let Some(id) = working_set.find_in_tab(highlight_tab(target), pattern) else {
                return Ok(EditOutcome::NotFound);
            };
            working_set.remove(id);
            sessions.commit(&working_set)?;
        }
        RuleTarget::Blacklist => {
            let mut working_set = sessions.open_blacklist();
            let Some(id) = working_set.find(pattern) else {
                return Ok(EditOutcome::NotFound);
            };
            working_set.remove(id);
            sessions.commit(&working_set)?;
        }
    }

    Ok(EditOutcome::Removed)
}

fn highlight_tab(target: RuleTarget) -> HighlightTarget {
    match target {
        RuleTarget::User => HighlightTarget::User,
        RuleTarget::Message | RuleTarget::Blacklist => HighlightTarget::Message,
    }
}
