//! Tree Builder - Snapshot to Forest
//!
//! Converts a flat [`RuleSnapshot`] into a validated [`Forest`]. Building
//! never fails: corrupt hierarchy edges (self-reference, missing endpoints,
//! second parents, cycles) are rejected and recorded as conflict data, and
//! the remaining structure is returned as a best-effort forest.
//!
//! # Edge Processing Order
//!
//! Edges are processed in snapshot input order, so cycle rejection is
//! order-sensitive: the edge that would *complete* a cycle is the one
//! rejected, and earlier edges of the same cycle stay accepted. This is a
//! deliberate, deterministic policy; see DESIGN.md.

use crate::models::{
    ConflictNode, ConflictReason, ConflictRelation, Forest, Group, RuleSnapshot,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Build a forest from a flat snapshot.
///
/// Absence of groups yields an empty forest. Keywords whose `group_id` has
/// no matching group are dropped with a warning (a data-quality issue, not
/// an error).
///
/// # Examples
///
/// ```rust
/// use rulespace_core::models::RuleSnapshot;
/// use rulespace_core::services::tree_builder::build;
///
/// let forest = build(&RuleSnapshot::empty(0));
/// assert!(forest.is_empty());
/// assert!(forest.conflict_relations.is_empty());
/// ```
pub fn build(snapshot: &RuleSnapshot) -> Forest {
    // Group ids in input order; the map carries per-group state while edges
    // are resolved on the id graph, before any owned tree exists.
    let mut order: Vec<i64> = Vec::with_capacity(snapshot.groups.len());
    let mut groups: HashMap<i64, Group> = HashMap::with_capacity(snapshot.groups.len());
    for record in &snapshot.groups {
        if groups.contains_key(&record.group_id) {
            warn!(group_id = record.group_id, "duplicate group record dropped");
            continue;
        }
        order.push(record.group_id);
        groups.insert(
            record.group_id,
            Group::new(record.group_id, record.group_name.clone(), record.is_enabled),
        );
    }

    for record in &snapshot.keywords {
        match groups.get_mut(&record.group_id) {
            Some(group) => {
                if !group.add_keyword(record.keyword.clone(), record.is_enabled) {
                    warn!(
                        group_id = record.group_id,
                        keyword = %record.keyword,
                        "duplicate keyword dropped"
                    );
                }
            }
            None => {
                warn!(
                    group_id = record.group_id,
                    keyword = %record.keyword,
                    "keyword references a missing group, dropped"
                );
            }
        }
    }

    // Resolve edges on the id graph: accepted children per parent, and the
    // single accepted parent per child.
    let mut children_of: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut parent_of: HashMap<i64, i64> = HashMap::new();
    let mut relations: Vec<ConflictRelation> = Vec::new();
    let mut flagged: Vec<(i64, ConflictReason, String)> = Vec::new();

    for edge in &snapshot.hierarchy {
        let (p, c) = (edge.parent_id, edge.child_id);
        let exists = |id: i64| groups.contains_key(&id);

        let rejection = if p == c {
            Some((
                ConflictReason::SelfReference,
                format!("group {p} cannot be its own parent"),
            ))
        } else if !exists(p) || !exists(c) {
            let missing = if exists(p) { c } else { p };
            Some((
                ConflictReason::Orphan,
                format!("edge {p}->{c} references missing group {missing}"),
            ))
        } else if let Some(existing) = parent_of.get(&c).copied() {
            Some((
                ConflictReason::DuplicateParent,
                format!("group {c} already has parent {existing}, edge from {p} rejected"),
            ))
        } else if reachable(&children_of, c, p) {
            Some((
                ConflictReason::Cycle,
                format!("edge {p}->{c} would make group {p} a descendant of itself via {c}"),
            ))
        } else {
            None
        };

        match rejection {
            Some((reason, detail)) => {
                debug!(parent_id = p, child_id = c, ?reason, "hierarchy edge rejected");
                relations.push(ConflictRelation {
                    parent_id: p,
                    child_id: c,
                    reason,
                    detail: detail.clone(),
                });
                for id in [p, c] {
                    if exists(id) && !flagged.iter().any(|(f, _, _)| *f == id) {
                        flagged.push((id, reason, detail.clone()));
                    }
                }
            }
            None => {
                children_of.entry(p).or_default().push(c);
                parent_of.insert(c, p);
            }
        }
    }

    // Mark conflict nodes before materializing so the flags travel with the
    // built groups.
    for (id, reason, _) in &flagged {
        if let Some(group) = groups.get_mut(id) {
            group.conflict = Some(*reason);
        }
    }

    // Materialize the owned tree from the id graph. Conflict nodes with no
    // accepted parent are roots like any other group: they must still render.
    fn materialize(
        id: i64,
        groups: &mut HashMap<i64, Group>,
        children_of: &HashMap<i64, Vec<i64>>,
    ) -> Option<Group> {
        let mut node = groups.remove(&id)?;
        if let Some(child_ids) = children_of.get(&id) {
            for &child_id in child_ids {
                if let Some(child) = materialize(child_id, groups, children_of) {
                    node.children.push(child);
                }
            }
        }
        Some(node)
    }

    let mut roots = Vec::new();
    for &id in &order {
        if parent_of.contains_key(&id) {
            continue;
        }
        if let Some(root) = materialize(id, &mut groups, &children_of) {
            roots.push(root);
        }
    }

    let conflict_nodes = flagged
        .into_iter()
        .map(|(group_id, reason, detail)| {
            let name = roots_name(&roots, group_id).unwrap_or_default();
            ConflictNode {
                group_id,
                name,
                reason,
                detail,
            }
        })
        .collect();

    Forest {
        roots,
        conflict_nodes,
        conflict_relations: relations,
    }
}

/// Can `target` be reached from `start` by walking accepted children?
fn reachable(children_of: &HashMap<i64, Vec<i64>>, start: i64, target: i64) -> bool {
    let mut stack = vec![start];
    let mut seen = vec![start];
    while let Some(id) = stack.pop() {
        if id == target {
            return true;
        }
        if let Some(children) = children_of.get(&id) {
            for &child in children {
                if !seen.contains(&child) {
                    seen.push(child);
                    stack.push(child);
                }
            }
        }
    }
    false
}

fn roots_name(roots: &[Group], id: i64) -> Option<String> {
    fn walk(nodes: &[Group], id: i64) -> Option<String> {
        for node in nodes {
            if node.id == id {
                return Some(node.name.clone());
            }
            if let Some(name) = walk(&node.children, id) {
                return Some(name);
            }
        }
        None
    }
    walk(roots, id)
}
