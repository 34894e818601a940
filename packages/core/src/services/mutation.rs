//! Mutation Intents
//!
//! [`MutationIntent`] is the tagged representation of every client action
//! the pipeline can submit. Each variant knows three things:
//!
//! - its server endpoint and operation payload
//! - how to apply itself optimistically to the local forest (one
//!   fully-specified local apply per variant, no fallthrough "assume
//!   success")
//! - whether it is still meaningful against a freshly merged forest, which
//!   is the question the pipeline asks before replaying after a version
//!   conflict

use crate::models::{Forest, Group, ROOT_GROUP_ID};
use crate::services::planner::would_create_cycle;
use crate::transport::MutationEndpoint;
use serde_json::{json, Value};

/// One client action against the shared rule set
#[derive(Debug, Clone, PartialEq)]
pub enum MutationIntent {
    /// Create a new root group (the server assigns the real id)
    AddGroup { name: String },

    /// Rename a group and/or set its enabled flag
    UpdateGroup {
        group_id: i64,
        name: String,
        enabled: bool,
    },

    /// Flip only the enabled flag (soft delete / restore)
    ToggleGroup { group_id: i64, enabled: bool },

    /// Delete a group; keywords are removed and children are recursively
    /// deleted (cascading policy, see DESIGN.md)
    DeleteGroup { group_id: i64 },

    AddKeyword { group_id: i64, text: String },

    RemoveKeyword { group_id: i64, text: String },

    /// Attach `child_id` under `parent_id` ([`ROOT_GROUP_ID`] re-roots)
    AddEdge { parent_id: i64, child_id: i64 },

    /// Detach `child_id` from `parent_id`; the child becomes a root
    RemoveEdge { parent_id: i64, child_id: i64 },

    /// Move several children under one parent in a single request
    BatchMove {
        parent_id: i64,
        child_ids: Vec<i64>,
    },
}

impl MutationIntent {
    /// The server endpoint this intent posts to
    pub fn endpoint(&self) -> MutationEndpoint {
        match self {
            MutationIntent::AddGroup { .. } => MutationEndpoint::GroupAdd,
            MutationIntent::UpdateGroup { .. } => MutationEndpoint::GroupUpdate,
            MutationIntent::ToggleGroup { .. } => MutationEndpoint::GroupToggle,
            MutationIntent::DeleteGroup { .. } => MutationEndpoint::GroupDelete,
            MutationIntent::AddKeyword { .. } => MutationEndpoint::KeywordAdd,
            MutationIntent::RemoveKeyword { .. } => MutationEndpoint::KeywordRemove,
            MutationIntent::AddEdge { .. } => MutationEndpoint::HierarchyAdd,
            MutationIntent::RemoveEdge { .. } => MutationEndpoint::HierarchyRemove,
            MutationIntent::BatchMove { .. } => MutationEndpoint::HierarchyBatchMove,
        }
    }

    /// Operation payload fields (the concurrency envelope is added by the
    /// transport request)
    pub fn payload(&self) -> Value {
        match self {
            MutationIntent::AddGroup { name } => json!({"group_name": name}),
            MutationIntent::UpdateGroup {
                group_id,
                name,
                enabled,
            } => json!({"group_id": group_id, "group_name": name, "is_enabled": enabled}),
            MutationIntent::ToggleGroup { group_id, enabled } => {
                json!({"group_id": group_id, "is_enabled": enabled})
            }
            MutationIntent::DeleteGroup { group_id } => json!({"group_id": group_id}),
            MutationIntent::AddKeyword { group_id, text } => {
                json!({"group_id": group_id, "keyword": text})
            }
            MutationIntent::RemoveKeyword { group_id, text } => {
                json!({"group_id": group_id, "keyword": text})
            }
            MutationIntent::AddEdge {
                parent_id,
                child_id,
            } => json!({"parent_id": parent_id, "child_id": child_id}),
            MutationIntent::RemoveEdge {
                parent_id,
                child_id,
            } => json!({"parent_id": parent_id, "child_id": child_id}),
            MutationIntent::BatchMove {
                parent_id,
                child_ids,
            } => json!({"parent_id": parent_id, "child_ids": child_ids}),
        }
    }

    /// Short human-readable description for logs and error reports
    pub fn describe(&self) -> String {
        match self {
            MutationIntent::AddGroup { name } => format!("add group \"{name}\""),
            MutationIntent::UpdateGroup { group_id, name, .. } => {
                format!("update group {group_id} to \"{name}\"")
            }
            MutationIntent::ToggleGroup { group_id, enabled } => {
                format!("toggle group {group_id} to enabled={enabled}")
            }
            MutationIntent::DeleteGroup { group_id } => format!("delete group {group_id}"),
            MutationIntent::AddKeyword { group_id, text } => {
                format!("add keyword \"{text}\" to group {group_id}")
            }
            MutationIntent::RemoveKeyword { group_id, text } => {
                format!("remove keyword \"{text}\" from group {group_id}")
            }
            MutationIntent::AddEdge {
                parent_id,
                child_id,
            } => format!("move group {child_id} under {parent_id}"),
            MutationIntent::RemoveEdge {
                parent_id,
                child_id,
            } => format!("detach group {child_id} from {parent_id}"),
            MutationIntent::BatchMove {
                parent_id,
                child_ids,
            } => format!("move {} group(s) under {parent_id}", child_ids.len()),
        }
    }

    /// Apply the intent speculatively to the local forest.
    ///
    /// Best-effort by design: the pipeline re-renders immediately from the
    /// result and replaces it with the authoritative state after the commit
    /// round trip. Returns whether anything changed.
    pub fn apply_optimistic(&self, forest: &mut Forest) -> bool {
        match self {
            MutationIntent::AddGroup { name } => {
                // The server assigns the real id on commit; a provisional
                // negative id keeps the node renderable until the resync.
                let provisional = forest.ids().iter().min().copied().unwrap_or(0).min(0) - 1;
                forest.roots.push(Group::new(provisional, name.clone(), true));
                true
            }
            MutationIntent::UpdateGroup {
                group_id,
                name,
                enabled,
            } => match forest.find_mut(*group_id) {
                Some(group) => {
                    group.name = name.clone();
                    group.is_enabled = *enabled;
                    true
                }
                None => false,
            },
            MutationIntent::ToggleGroup { group_id, enabled } => {
                match forest.find_mut(*group_id) {
                    Some(group) => {
                        group.is_enabled = *enabled;
                        true
                    }
                    None => false,
                }
            }
            MutationIntent::DeleteGroup { group_id } => forest.remove_subtree(*group_id),
            MutationIntent::AddKeyword { group_id, text } => match forest.find_mut(*group_id) {
                Some(group) => group.add_keyword(text.clone(), true),
                None => false,
            },
            MutationIntent::RemoveKeyword { group_id, text } => {
                match forest.find_mut(*group_id) {
                    Some(group) => group.remove_keyword(text),
                    None => false,
                }
            }
            MutationIntent::AddEdge {
                parent_id,
                child_id,
            } => move_child(forest, *parent_id, *child_id),
            MutationIntent::RemoveEdge { child_id, .. } => {
                move_child(forest, ROOT_GROUP_ID, *child_id)
            }
            MutationIntent::BatchMove {
                parent_id,
                child_ids,
            } => {
                let mut changed = false;
                for &child_id in child_ids {
                    changed |= move_child(forest, *parent_id, child_id);
                }
                changed
            }
        }
    }

    /// Is this intent still meaningful against a freshly merged forest?
    ///
    /// Called after a version conflict, once the local forest has been
    /// rebuilt from the server's latest snapshot. Unknown situations defer
    /// to the server, which re-validates independently and may answer with
    /// another conflict.
    pub fn is_still_valid(&self, forest: &Forest) -> bool {
        match self {
            // The server tolerates duplicate names; adding is always replayable
            MutationIntent::AddGroup { .. } => true,
            MutationIntent::UpdateGroup { group_id, .. }
            | MutationIntent::ToggleGroup { group_id, .. }
            | MutationIntent::DeleteGroup { group_id } => forest.contains(*group_id),
            MutationIntent::AddKeyword { group_id, .. } => forest.contains(*group_id),
            MutationIntent::RemoveKeyword { group_id, text } => {
                forest.keyword_exists(*group_id, text)
            }
            MutationIntent::AddEdge {
                parent_id,
                child_id,
            }
            | MutationIntent::RemoveEdge {
                parent_id,
                child_id,
            } => parent_exists(forest, *parent_id) && forest.contains(*child_id),
            MutationIntent::BatchMove {
                parent_id,
                child_ids,
            } => {
                parent_exists(forest, *parent_id)
                    && child_ids.iter().all(|id| forest.contains(*id))
            }
        }
    }
}

fn parent_exists(forest: &Forest, parent_id: i64) -> bool {
    parent_id == ROOT_GROUP_ID || forest.contains(parent_id)
}

/// Re-parent a child in the local forest, refusing cycles
fn move_child(forest: &mut Forest, parent_id: i64, child_id: i64) -> bool {
    if would_create_cycle(forest, parent_id, child_id) {
        return false;
    }
    match forest.detach(child_id) {
        Some(child) => {
            forest.attach(parent_id, child);
            true
        }
        None => false,
    }
}
