//! RuleTransport Trait - Server Abstraction Layer
//!
//! This module defines the [`RuleTransport`] trait that abstracts the rules
//! server for the sync session and the mutation pipeline. The server is an
//! opaque collaborator: it accepts mutation requests carrying a
//! `base_version` and either commits them (returning a new version) or
//! rejects them with a conflict payload embedding the latest authoritative
//! snapshot.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: both operations hit the network and may suspend
//! 2. **Conflicts are data, not errors**: a `409` is an expected protocol
//!    outcome the pipeline recovers from automatically, so it is modeled as
//!    a [`CommitOutcome`] variant rather than a [`TransportError`]
//! 3. **Version precondition as an argument**: the conditional fetch carries
//!    the caller's `base_version`; passing `None` forces a full snapshot
//!    (used after conflict recovery and for manual refresh)

use crate::models::RuleSnapshot;
use crate::transport::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mutation endpoints exposed by the rules server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEndpoint {
    GroupAdd,
    GroupUpdate,
    GroupToggle,
    GroupDelete,
    KeywordAdd,
    KeywordRemove,
    HierarchyAdd,
    HierarchyRemove,
    HierarchyBatchMove,
}

impl MutationEndpoint {
    /// Path suffix under the rules base route
    pub fn path(&self) -> &'static str {
        match self {
            MutationEndpoint::GroupAdd => "group/add",
            MutationEndpoint::GroupUpdate => "group/update",
            MutationEndpoint::GroupToggle => "group/toggle",
            MutationEndpoint::GroupDelete => "group/delete",
            MutationEndpoint::KeywordAdd => "keyword/add",
            MutationEndpoint::KeywordRemove => "keyword/remove",
            MutationEndpoint::HierarchyAdd => "hierarchy/add",
            MutationEndpoint::HierarchyRemove => "hierarchy/remove",
            MutationEndpoint::HierarchyBatchMove => "hierarchy/batch_move",
        }
    }
}

/// A mutation request ready for submission
///
/// The operation payload stays separate from the concurrency envelope
/// (`base_version`, `client_id`) so replays can resend the same payload
/// under a new version without rebuilding it.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub endpoint: MutationEndpoint,

    /// Operation fields only (e.g. `{"group_id": 3, "keyword": "cat"}`)
    pub payload: Value,

    /// The version this client believes the server is at
    pub base_version: i64,

    /// Opaque client identity token, used for modifier attribution only
    pub client_id: String,
}

impl CommitRequest {
    /// Full request body: payload fields plus the concurrency envelope
    pub fn body(&self) -> Value {
        let mut body = self.payload.clone();
        if let Some(map) = body.as_object_mut() {
            map.insert("base_version".to_string(), Value::from(self.base_version));
            map.insert("client_id".to_string(), Value::from(self.client_id.clone()));
        }
        body
    }
}

/// Per-child rejection inside a partially successful batch move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildMoveError {
    pub child_id: i64,
    pub error: String,
}

/// Success response of a mutation: `{version_id, new_id?, moved?, errors?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// New authoritative version after the accepted mutation
    pub version_id: i64,

    /// Server-assigned id for add operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_id: Option<i64>,

    /// Children actually moved by a batch move (absent for other mutations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved: Option<Vec<i64>>,

    /// Per-child rejections of a partially successful batch move
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ChildMoveError>,
}

/// Conflict response body of a `409`: the latest authoritative snapshot plus
/// the number of distinct clients that modified the rules since
/// `base_version`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictPayload {
    pub latest_data: RuleSnapshot,
    pub unique_modifiers: u32,
}

/// Outcome of submitting a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The server accepted the mutation and advanced the version counter
    Committed(CommitReceipt),
    /// The server rejected the mutation because `base_version` is stale
    Conflict(ConflictPayload),
}

/// Outcome of a conditional snapshot fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The server is still at the preconditioned version; no body was sent,
    /// the caller must rehydrate from its own cache
    NotModified,
    /// A full new snapshot
    Snapshot(RuleSnapshot),
}

/// Abstraction over the rules server
///
/// Implementations must be `Send + Sync`; the sync session shares one
/// transport across concurrent tasks.
#[async_trait]
pub trait RuleTransport: Send + Sync {
    /// Fetch the rule snapshot, conditionally.
    ///
    /// `precondition` carries the client's `base_version`; the server answers
    /// [`FetchOutcome::NotModified`] when that version is still current.
    /// `None` skips the precondition and always yields a full snapshot.
    async fn fetch(&self, precondition: Option<i64>) -> Result<FetchOutcome>;

    /// Submit one mutation under the optimistic-concurrency envelope.
    ///
    /// A stale `base_version` yields [`CommitOutcome::Conflict`]; transport
    /// and server failures yield `Err`.
    async fn submit(&self, request: &CommitRequest) -> Result<CommitOutcome>;
}
