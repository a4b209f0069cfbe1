//! Highlight and blacklist rules: persistence, matching and editing.

pub mod codec;
pub mod matcher;
pub mod session;
pub mod snapshot;
pub mod store;

pub use matcher::classify;
pub use session::{CommitSummary, EntryId, HighlightSession, WorkingSet};
pub use snapshot::RuleSnapshot;
pub use store::{RuleStore, StoreError};

/// Returns the rules module name for smoke checks.
pub fn module_name() -> &'static str {
    "rules"
}
