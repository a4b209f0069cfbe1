//! Domain layer: chat items, rules and the views built from them.

pub mod chat_item;
pub mod classification;
pub mod rule;
pub mod view;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
