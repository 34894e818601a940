//! Hierarchy Mutation Planner - Client-Side Cycle Prevention
//!
//! Pre-flight checks for hierarchy changes, run locally before any network
//! round trip. The planner is non-authoritative: the server re-validates
//! every move, and a stale local forest can make the planner wrong in either
//! direction. Its job is to avoid obviously doomed requests, not to decide.

use crate::models::{Forest, ROOT_GROUP_ID};

/// Would moving `child_id` under `parent_id` create a cycle?
///
/// True iff `parent_id == child_id`, or `child_id` is an ancestor of
/// `parent_id` in the current forest (the move would make `parent_id` a
/// descendant of itself). Moving to the forest root ([`ROOT_GROUP_ID`])
/// can never cycle.
///
/// # Examples
///
/// ```rust
/// use rulespace_core::models::{Forest, ROOT_GROUP_ID};
/// use rulespace_core::services::planner::would_create_cycle;
///
/// let forest = Forest::empty();
/// assert!(would_create_cycle(&forest, 3, 3));
/// assert!(!would_create_cycle(&forest, ROOT_GROUP_ID, 3));
/// ```
pub fn would_create_cycle(forest: &Forest, parent_id: i64, child_id: i64) -> bool {
    if parent_id == child_id {
        return true;
    }
    if parent_id == ROOT_GROUP_ID {
        return false;
    }

    // Walk upward from the target parent; hitting the moved child means the
    // child is an ancestor of its proposed parent.
    let parents = forest.parent_index();
    let mut current = parent_id;
    while let Some(&parent) = parents.get(&current) {
        if parent == child_id {
            return true;
        }
        current = parent;
    }
    false
}

/// A batch-move candidate rejected locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedMove {
    pub child_id: i64,
    pub reason: String,
}

/// Split batch-move candidates into sendable and locally rejected.
///
/// Children whose move would cycle are filtered out before the request is
/// built; the server still performs the authoritative per-child check on
/// the rest.
pub fn partition_moves(
    forest: &Forest,
    parent_id: i64,
    child_ids: &[i64],
) -> (Vec<i64>, Vec<RejectedMove>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for &child_id in child_ids {
        if would_create_cycle(forest, parent_id, child_id) {
            rejected.push(RejectedMove {
                child_id,
                reason: "would create cycle".to_string(),
            });
        } else {
            accepted.push(child_id);
        }
    }
    (accepted, rejected)
}
