//! Core Services
//!
//! This module contains the rule-forest logic:
//!
//! - `tree_builder` - flat snapshot to validated forest, cycle detection
//! - `expansion` - keyword synonym closure for search
//! - `planner` - client-side cycle prevention for hierarchy moves
//! - `SyncSession` - version gate, cache plumbing, change events
//! - mutation pipeline - optimistic apply, commit, conflict, bounded replay
//!
//! Services coordinate between the transport/cache collaborators and the
//! data model, implementing the synchronization protocol end to end.

pub mod error;
pub mod events;
pub mod expansion;
pub mod mutation;
pub mod pipeline;
pub mod planner;
pub mod sync_session;
pub mod tree_builder;


pub use error::RuleSyncError;
pub use events::{debounced, RulesEvent, UpdateOrigin, RULES_EVENT_CHANNEL_CAPACITY};
pub use mutation::MutationIntent;
pub use pipeline::{MergedSave, MoveManyReceipt, SaveReceipt, MAX_REPLAY_ATTEMPTS};
pub use planner::{partition_moves, would_create_cycle, RejectedMove};
pub use sync_session::{SyncOutcome, SyncSession};
