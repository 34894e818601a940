//! Rule Forest
//!
//! The built, validated form of the shared rule set: a forest of [`Group`]
//! nodes, each owning its keywords and its accepted children, plus the
//! conflict metadata recorded while rejecting corrupt hierarchy edges.
//!
//! # Invariants
//!
//! - No group is reachable from itself via `children` (acyclic)
//! - Every group is reachable from `roots` exactly once (at most one accepted
//!   parent; groups with no accepted parent are roots)
//! - Groups implicated in a rejected edge still appear in the forest as
//!   best-effort roots rather than disappearing; their `conflict` field and
//!   the forest-level conflict lists carry the rejection reason
//!
//! The forest is a plain value type. Structural mutation helpers below exist
//! for the optimistic-apply step of the mutation pipeline; the authoritative
//! state is always the server's and is re-fetched after every commit.
//!
//! Serialization uses camelCase field names: the built tree is the render
//! contract consumed by frontend code, unlike the snapshot wire records
//! which mirror the server protocol verbatim.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel parent id meaning "the forest root" in hierarchy mutations.
///
/// Moving a group under `ROOT_GROUP_ID` detaches it from any parent; the
/// server uses the same sentinel, so it never collides with a real group id.
pub const ROOT_GROUP_ID: i64 = 0;

/// A single keyword synonym inside a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    /// Keyword text, unique within the owning group
    pub text: String,

    /// Disabled keywords are excluded from expansion but stay visible for editing
    pub is_enabled: bool,
}

/// Why a hierarchy edge was rejected during forest construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// An endpoint of the edge does not exist in the snapshot
    Orphan,
    /// `parent_id == child_id`
    SelfReference,
    /// Accepting the edge would make a group an ancestor of itself
    Cycle,
    /// The child already has an accepted parent
    DuplicateParent,
}

/// A rejected raw hierarchy edge, kept for manual cleanup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRelation {
    pub parent_id: i64,
    pub child_id: i64,
    pub reason: ConflictReason,
    /// Human-readable detail referencing the other endpoint
    pub detail: String,
}

/// A group implicated in a rejected edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictNode {
    pub group_id: i64,
    pub name: String,
    pub reason: ConflictReason,
    pub detail: String,
}

/// A rule group node: named, toggleable, owning keywords and accepted children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Server-assigned id; optimistic adds use a provisional negative id
    /// until the next resync replaces it with the real one
    pub id: i64,

    /// Display name; may be empty
    pub name: String,

    pub is_enabled: bool,

    /// Keywords in insertion order (order is irrelevant to search semantics)
    pub keywords: Vec<Keyword>,

    /// Accepted children, in edge acceptance order
    pub children: Vec<Group>,

    /// Set when this group was touched by a rejected hierarchy edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictReason>,
}

impl Group {
    /// Create a detached group with no keywords or children
    pub fn new(id: i64, name: impl Into<String>, is_enabled: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_enabled,
            keywords: Vec::new(),
            children: Vec::new(),
            conflict: None,
        }
    }

    /// Look up a keyword by exact text
    pub fn keyword(&self, text: &str) -> Option<&Keyword> {
        self.keywords.iter().find(|k| k.text == text)
    }

    /// Add a keyword unless the text already exists in this group
    ///
    /// Returns `false` on duplicate text (keyword text is unique per group).
    pub fn add_keyword(&mut self, text: impl Into<String>, is_enabled: bool) -> bool {
        let text = text.into();
        if self.keyword(&text).is_some() {
            return false;
        }
        self.keywords.push(Keyword { text, is_enabled });
        true
    }

    /// Remove a keyword by exact text; returns whether it existed
    pub fn remove_keyword(&mut self, text: &str) -> bool {
        let before = self.keywords.len();
        self.keywords.retain(|k| k.text != text);
        self.keywords.len() != before
    }
}

/// The built rule forest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forest {
    /// Groups with no accepted parent, in snapshot input order
    #[serde(default)]
    pub roots: Vec<Group>,

    /// Groups touched by a rejected edge (also present somewhere in `roots`)
    #[serde(default)]
    pub conflict_nodes: Vec<ConflictNode>,

    /// Rejected raw edges, in input order
    #[serde(default)]
    pub conflict_relations: Vec<ConflictRelation>,
}

impl Forest {
    /// A forest with no groups at all
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of groups in the forest
    pub fn group_count(&self) -> usize {
        fn count(node: &Group) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    /// Depth-first lookup of a group by id
    pub fn find(&self, id: i64) -> Option<&Group> {
        fn walk<'a>(nodes: &'a [Group], id: i64) -> Option<&'a Group> {
            for node in nodes {
                if node.id == id {
                    return Some(node);
                }
                if let Some(found) = walk(&node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.roots, id)
    }

    /// Depth-first mutable lookup of a group by id
    pub fn find_mut(&mut self, id: i64) -> Option<&mut Group> {
        fn walk<'a>(nodes: &'a mut [Group], id: i64) -> Option<&'a mut Group> {
            for node in nodes {
                if node.id == id {
                    return Some(node);
                }
                if let Some(found) = walk(&mut node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&mut self.roots, id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.find(id).is_some()
    }

    /// Whether `group_id` holds a keyword with the exact `text`
    pub fn keyword_exists(&self, group_id: i64, text: &str) -> bool {
        self.find(group_id)
            .map(|g| g.keyword(text).is_some())
            .unwrap_or(false)
    }

    /// Map of child id to accepted parent id (roots are absent)
    pub fn parent_index(&self) -> HashMap<i64, i64> {
        fn walk(node: &Group, index: &mut HashMap<i64, i64>) {
            for child in &node.children {
                index.insert(child.id, node.id);
                walk(child, index);
            }
        }
        let mut index = HashMap::new();
        for root in &self.roots {
            walk(root, &mut index);
        }
        index
    }

    /// All group ids in depth-first order
    pub fn ids(&self) -> Vec<i64> {
        fn walk(node: &Group, out: &mut Vec<i64>) {
            out.push(node.id);
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, &mut out);
        }
        out
    }

    /// Detach the subtree rooted at `id` and return it, wherever it sits.
    ///
    /// Returns `None` if the group does not exist. The subtree keeps its own
    /// children; only the link from its former parent (or the root list) is
    /// severed.
    pub fn detach(&mut self, id: i64) -> Option<Group> {
        fn take(nodes: &mut Vec<Group>, id: i64) -> Option<Group> {
            if let Some(pos) = nodes.iter().position(|n| n.id == id) {
                return Some(nodes.remove(pos));
            }
            for node in nodes.iter_mut() {
                if let Some(found) = take(&mut node.children, id) {
                    return Some(found);
                }
            }
            None
        }
        take(&mut self.roots, id)
    }

    /// Attach a detached subtree under `parent_id`, or to the root list when
    /// `parent_id` is [`ROOT_GROUP_ID`].
    ///
    /// Returns `false` (and drops nothing - the node is re-rooted) when the
    /// parent does not exist; callers are expected to have pre-validated the
    /// move with the hierarchy planner.
    pub fn attach(&mut self, parent_id: i64, node: Group) -> bool {
        if parent_id == ROOT_GROUP_ID {
            self.roots.push(node);
            return true;
        }
        match self.find_mut(parent_id) {
            Some(parent) => {
                parent.children.push(node);
                true
            }
            None => {
                self.roots.push(node);
                false
            }
        }
    }

    /// Remove the subtree rooted at `id` entirely (cascading delete).
    ///
    /// Returns whether the group existed.
    pub fn remove_subtree(&mut self, id: i64) -> bool {
        self.detach(id).is_some()
    }
}
