//! Use case layer: application workflows and orchestration.

pub mod bootstrap;
pub mod classify_message;
pub mod context;
pub mod edit_rules;
pub mod watch_channel;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
