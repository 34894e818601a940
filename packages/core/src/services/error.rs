//! Sync Error Taxonomy
//!
//! Error types for the version gate and the mutation pipeline. Structural
//! conflicts (cycles, orphans, self-references) are deliberately absent:
//! those are recovered by the tree builder and surfaced as forest data,
//! never as errors. Version conflicts only become errors once automatic
//! replay is no longer possible.

use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced by the sync session and mutation pipeline
///
/// The pipeline's return value alone lets a UI distinguish "saved", "saved
/// after automatic merge", and the failure modes below.
#[derive(Error, Debug)]
pub enum RuleSyncError {
    /// The action no longer applies against the latest server state
    /// (e.g. the target group was deleted by another client). Not retried.
    #[error("action no longer applies after syncing to the latest rules ({other_editors} other client(s) modified them): {action}")]
    ValidityFailure { action: String, other_editors: u32 },

    /// The replay bound was exhausted under a conflict storm; the local
    /// state was resynced to the server before reporting.
    #[error("gave up after {attempts} replays under repeated version conflicts; please refresh and retry")]
    RetryBudgetExhausted { attempts: u32 },

    /// Network or server failure; no version state was changed
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The persistent cache collaborator failed
    #[error("cache operation failed: {0}")]
    Cache(anyhow::Error),

    /// The server answered "unchanged" but no cached snapshot exists to
    /// rehydrate from
    #[error("server reported no changes but no cached snapshot is available; force a full sync")]
    MissingCachedSnapshot,

    /// Persisted state could not be parsed
    #[error("corrupt cached state: {0}")]
    CorruptCache(String),
}

impl RuleSyncError {
    /// Create a validity failure
    pub fn validity_failure(action: impl Into<String>, other_editors: u32) -> Self {
        Self::ValidityFailure {
            action: action.into(),
            other_editors,
        }
    }

    /// Create a retry-budget-exhausted error
    pub fn retry_budget_exhausted(attempts: u32) -> Self {
        Self::RetryBudgetExhausted { attempts }
    }

    /// Wrap a cache collaborator error
    pub fn cache(source: anyhow::Error) -> Self {
        Self::Cache(source)
    }

    /// Create a corrupt cache error
    pub fn corrupt_cache(msg: impl Into<String>) -> Self {
        Self::CorruptCache(msg.into())
    }
}
