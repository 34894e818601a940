//! Snapshot Wire Format
//!
//! Flat records exchanged with the rules server. A [`RuleSnapshot`] is the
//! body of a `200` fetch response, the `latest_data` payload of a `409`
//! conflict response, and the value persisted in the snapshot cache between
//! sessions.
//!
//! Field names follow the server's existing protocol (`group_id`,
//! `group_name`, `is_enabled`, ...) so no rename layer is applied.
//! SQLite-backed deployments serve `is_enabled` as a `0`/`1` integer rather
//! than a JSON boolean; deserialization accepts both.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept a JSON boolean or a 0/1 integer for enabled flags.
fn flag_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

fn default_enabled() -> bool {
    true
}

/// One rule group row: `{group_id, group_name, is_enabled}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Server-assigned unique id
    pub group_id: i64,

    /// Display name; may be empty (a valid but degenerate state)
    #[serde(default)]
    pub group_name: String,

    /// Soft-delete flag; disabled groups stay visible for editing
    #[serde(default = "default_enabled", deserialize_with = "flag_from_any")]
    pub is_enabled: bool,
}

/// One keyword row: `{group_id, keyword, is_enabled}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRecord {
    /// Owning group id; rows pointing at a missing group are dropped during build
    pub group_id: i64,

    /// Keyword text, unique within its owning group
    pub keyword: String,

    #[serde(default = "default_enabled", deserialize_with = "flag_from_any")]
    pub is_enabled: bool,
}

/// One raw hierarchy edge: `{parent_id, child_id}`
///
/// Edges are input to the tree builder only; after a forest is built they
/// exist either as `children` links or as rejected conflict relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyRecord {
    pub parent_id: i64,
    pub child_id: i64,
}

/// Full flat snapshot of the shared rule set at one server version.
///
/// # Examples
///
/// ```rust
/// use rulespace_core::models::RuleSnapshot;
///
/// let snapshot: RuleSnapshot = serde_json::from_str(
///     r#"{
///         "version_id": 7,
///         "groups": [{"group_id": 1, "group_name": "animals", "is_enabled": 1}],
///         "keywords": [{"group_id": 1, "keyword": "cat", "is_enabled": true}],
///         "hierarchy": []
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(snapshot.version_id, 7);
/// assert!(snapshot.groups[0].is_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    /// Authoritative version counter at the time of the snapshot
    pub version_id: i64,

    #[serde(default)]
    pub groups: Vec<GroupRecord>,

    #[serde(default)]
    pub keywords: Vec<KeywordRecord>,

    #[serde(default)]
    pub hierarchy: Vec<HierarchyRecord>,
}

impl RuleSnapshot {
    /// An empty snapshot at the given version (used before the first sync)
    pub fn empty(version_id: i64) -> Self {
        Self {
            version_id,
            groups: Vec::new(),
            keywords: Vec::new(),
            hierarchy: Vec::new(),
        }
    }
}
