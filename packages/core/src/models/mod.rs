//! Data Models
//!
//! This module contains the core data structures for the rule forest:
//!
//! - `RuleSnapshot` and its flat records - the wire format exchanged with the
//!   rules server and persisted in the snapshot cache
//! - `Forest` / `Group` / `Keyword` - the built, validated tree plus the
//!   conflict metadata produced while rejecting corrupt hierarchy edges

mod forest;
mod snapshot;

pub use forest::{
    ConflictNode, ConflictReason, ConflictRelation, Forest, Group, Keyword, ROOT_GROUP_ID,
};
pub use snapshot::{GroupRecord, HierarchyRecord, KeywordRecord, RuleSnapshot};
