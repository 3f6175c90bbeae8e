//! Shared domain types for the agentloop runtime.
//!
//! Every other crate depends on this one: chat messages and tool calls
//! (provider-agnostic), LLM stream events, run events (the bus wire
//! format), stored records, task-list snapshots, the shared error type,
//! and the configuration tree.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod record;
pub mod stream;
pub mod tasklist;
