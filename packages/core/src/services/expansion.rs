//! Keyword Expansion Engine - Synonym Closure
//!
//! Translates a user's search token into the full set of equivalent terms by
//! walking the rule forest. A token that matches an enabled group's name, or
//! any enabled keyword inside it, expands to every enabled keyword of that
//! group and its enabled descendant groups; traversal stops at a matched
//! subtree so nothing is expanded twice. Disabled groups are pruned whole.
//!
//! The batched form is the sole entry point the search component calls:
//! within one token's set terms are OR'd, across different tokens' sets the
//! results are AND'd. The exclusion variant expands each term of a
//! comma-joined exclusion group independently so the caller can apply
//! intersection-style exclusion (exclude only items matching all terms).

use crate::models::{Forest, Group};
use std::collections::BTreeSet;

/// Expand a single token into its synonym closure.
///
/// The result always contains `token` itself, even when nothing in the
/// forest matches (identity fallback).
///
/// # Examples
///
/// ```rust
/// use rulespace_core::models::Forest;
/// use rulespace_core::services::expansion::expand;
///
/// let terms = expand(&Forest::empty(), "cat");
/// assert!(terms.contains("cat"));
/// assert_eq!(terms.len(), 1);
/// ```
pub fn expand(forest: &Forest, token: &str) -> BTreeSet<String> {
    let mut terms = BTreeSet::new();
    terms.insert(token.to_string());

    fn visit(node: &Group, token: &str, terms: &mut BTreeSet<String>) {
        if !node.is_enabled {
            return;
        }

        let name_hit = node.name == token;
        let keyword_hit = node
            .keywords
            .iter()
            .any(|k| k.is_enabled && k.text == token);

        if name_hit || keyword_hit {
            collect_closure(node, terms);
            return;
        }

        for child in &node.children {
            visit(child, token, terms);
        }
    }

    for root in &forest.roots {
        visit(root, token, &mut terms);
    }

    terms
}

/// Collect every enabled keyword of an enabled group and its enabled
/// descendant groups
fn collect_closure(node: &Group, terms: &mut BTreeSet<String>) {
    if !node.is_enabled {
        return;
    }
    for keyword in &node.keywords {
        if keyword.is_enabled {
            terms.insert(keyword.text.clone());
        }
    }
    for child in &node.children {
        collect_closure(child, terms);
    }
}

/// Expand a batch of tokens, one closure per input token.
///
/// Never fails and never returns an outer vector shorter than its input;
/// the caller ANDs across the per-token sets.
pub fn expand_many(forest: &Forest, tokens: &[String]) -> Vec<Vec<String>> {
    tokens
        .iter()
        .map(|token| expand(forest, token).into_iter().collect())
        .collect()
}

/// Expand each term of a comma-joined exclusion group independently.
///
/// Empty terms are skipped, so `"a,,b"` yields two sets. The caller treats
/// the per-term sets as an intersection-style exclusion, distinct from
/// ordinary OR exclusion.
pub fn expand_exclusion(forest: &Forest, joined: &str) -> Vec<Vec<String>> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| expand(forest, term).into_iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupRecord, HierarchyRecord, KeywordRecord, RuleSnapshot};
    use crate::services::tree_builder::build;

    fn forest() -> Forest {
        // animals(1) -> cats(2){meow, purr} -> big_cats(3){roar}
        //            -> dogs(4, disabled){woof}
        // tools(5){hammer}
        build(&RuleSnapshot {
            version_id: 1,
            groups: vec![
                GroupRecord {
                    group_id: 1,
                    group_name: "animals".into(),
                    is_enabled: true,
                },
                GroupRecord {
                    group_id: 2,
                    group_name: "cats".into(),
                    is_enabled: true,
                },
                GroupRecord {
                    group_id: 3,
                    group_name: "big_cats".into(),
                    is_enabled: true,
                },
                GroupRecord {
                    group_id: 4,
                    group_name: "dogs".into(),
                    is_enabled: false,
                },
                GroupRecord {
                    group_id: 5,
                    group_name: "tools".into(),
                    is_enabled: true,
                },
            ],
            keywords: vec![
                KeywordRecord {
                    group_id: 2,
                    keyword: "meow".into(),
                    is_enabled: true,
                },
                KeywordRecord {
                    group_id: 2,
                    keyword: "purr".into(),
                    is_enabled: false,
                },
                KeywordRecord {
                    group_id: 3,
                    keyword: "roar".into(),
                    is_enabled: true,
                },
                KeywordRecord {
                    group_id: 4,
                    keyword: "woof".into(),
                    is_enabled: true,
                },
                KeywordRecord {
                    group_id: 5,
                    keyword: "hammer".into(),
                    is_enabled: true,
                },
            ],
            hierarchy: vec![
                HierarchyRecord {
                    parent_id: 1,
                    child_id: 2,
                },
                HierarchyRecord {
                    parent_id: 2,
                    child_id: 3,
                },
                HierarchyRecord {
                    parent_id: 1,
                    child_id: 4,
                },
            ],
        })
    }

    #[test]
    fn test_group_name_hit_collects_descendant_closure() {
        // Matching a group name pulls the whole enabled subtree
        let terms = expand(&forest(), "animals");

        assert!(terms.contains("animals"));
        assert!(terms.contains("meow"));
        assert!(terms.contains("roar"));
        // Disabled keyword and disabled subtree stay out
        assert!(!terms.contains("purr"));
        assert!(!terms.contains("woof"));
    }

    #[test]
    fn test_minimal_two_level_closure() {
        let snapshot = RuleSnapshot {
            version_id: 1,
            groups: vec![
                GroupRecord {
                    group_id: 1,
                    group_name: "animals".into(),
                    is_enabled: true,
                },
                GroupRecord {
                    group_id: 2,
                    group_name: "cats".into(),
                    is_enabled: true,
                },
            ],
            keywords: vec![KeywordRecord {
                group_id: 2,
                keyword: "meow".into(),
                is_enabled: true,
            }],
            hierarchy: vec![HierarchyRecord {
                parent_id: 1,
                child_id: 2,
            }],
        };

        let terms = expand(&build(&snapshot), "animals");
        let expected: BTreeSet<String> = ["animals", "meow"].iter().map(|s| s.to_string()).collect();
        assert_eq!(terms, expected);
    }

    #[test]
    fn test_keyword_hit_expands_owning_subtree() {
        let terms = expand(&forest(), "meow");

        assert!(terms.contains("meow"));
        // Sibling and descendant synonyms of the matched group come along
        assert!(terms.contains("roar"));
        assert!(!terms.contains("hammer"));
    }

    #[test]
    fn test_identity_fallback_without_match() {
        let terms = expand(&forest(), "nonexistent");
        assert_eq!(terms.len(), 1);
        assert!(terms.contains("nonexistent"));
    }

    #[test]
    fn test_disabled_keyword_does_not_match() {
        // "purr" exists but is disabled; no subtree expansion
        let terms = expand(&forest(), "purr");
        assert_eq!(terms.len(), 1);
    }

    #[test]
    fn test_disabled_group_pruned() {
        // "dogs" group is disabled: neither its name nor its keywords match
        let terms = expand(&forest(), "dogs");
        assert_eq!(terms.len(), 1);

        let terms = expand(&forest(), "woof");
        assert_eq!(terms.len(), 1);
    }

    #[test]
    fn test_expand_many_preserves_arity() {
        let forest = forest();
        let tokens = vec!["cats".to_string(), "missing".to_string()];
        let expanded = expand_many(&forest, &tokens);

        assert_eq!(expanded.len(), tokens.len());
        assert!(expanded[0].contains(&"meow".to_string()));
        assert_eq!(expanded[1], vec!["missing".to_string()]);

        assert!(expand_many(&forest, &[]).is_empty());
    }

    #[test]
    fn test_expand_exclusion_splits_on_commas() {
        let forest = forest();
        let sets = expand_exclusion(&forest, "cats, tools,,");

        assert_eq!(sets.len(), 2);
        assert!(sets[0].contains(&"meow".to_string()));
        assert!(sets[1].contains(&"hammer".to_string()));
    }
}
