//! Chat stream multiplexer with a highlight/blacklist rule engine.
//!
//! Raw chat items from an external producer are fanned out per channel by
//! [`hub::ChannelStreamHub`], classified against the live
//! [`rules::RuleSnapshot`] and republished as materialized channel views.

pub mod domain;
pub mod hub;
pub mod infra;
pub mod rules;
pub mod usecases;

#[cfg(test)]
mod test_support;
