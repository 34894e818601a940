//! Mutation Pipeline - Optimistic Apply, Commit, Conflict, Replay
//!
//! The save path every client action goes through:
//!
//! 1. **Optimistic apply** - mutate the local forest immediately for
//!    responsiveness
//! 2. **Commit** - submit `{payload, base_version, client_id}`
//! 3. **Success** - adopt the new version and force a full resync so local
//!    state matches the server bit for bit, not just the approximation
//! 4. **Conflict** - silently rebuild from the server's embedded latest
//!    snapshot, re-check whether the original intent is still meaningful,
//!    and replay it under the merged state, bounded by
//!    [`MAX_REPLAY_ATTEMPTS`]
//! 5. **Transport failure** - leave version state untouched and roll the
//!    forest back to the last known-good snapshot
//!
//! Replay is an explicit loop with an attempt accumulator rather than
//! recursion: the bound is a visible, testable parameter and the call stack
//! stays flat under pathological conflict storms.

use crate::services::error::RuleSyncError;
use crate::services::events::UpdateOrigin;
use crate::services::mutation::MutationIntent;
use crate::services::planner::partition_moves;
use crate::services::sync_session::{SessionState, SyncSession};
use crate::transport::{ChildMoveError, CommitOutcome, CommitRequest};
use tracing::{debug, info, warn};

/// Maximum automatic replays after version conflicts before giving up.
///
/// A mutation already sent cannot be canceled; this bound is the only
/// control knob and guarantees termination under conflict storms.
pub const MAX_REPLAY_ATTEMPTS: u32 = 3;

/// Details of a save that went through automatic conflict merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedSave {
    /// Distinct other clients that modified the rules meanwhile, as
    /// reported by the last conflict response
    pub other_editors: u32,
    /// Conflict rounds absorbed before the commit succeeded
    pub replays: u32,
}

/// Successful outcome of [`SyncSession::save`]
///
/// `merged` is `None` for a clean first-try save; a UI renders "saved" or
/// "saved after automatic merge (N other edits occurred)" from this value
/// alone.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReceipt {
    /// Authoritative version after the commit
    pub version: i64,

    /// Server-assigned id for add operations
    pub new_id: Option<i64>,

    /// Present when at least one conflict round was absorbed automatically
    pub merged: Option<MergedSave>,

    /// Children actually moved, echoed by batch-move commits
    pub moved: Option<Vec<i64>>,

    /// Per-child rejections of a partially successful batch move
    pub child_errors: Vec<ChildMoveError>,
}

/// Outcome of [`SyncSession::move_many`]: partial success is ordinary data,
/// distinct from total failure
#[derive(Debug, Clone, PartialEq)]
pub struct MoveManyReceipt {
    /// Children confirmed moved (locally rejected ones never count)
    pub moved: u32,

    /// Locally rejected children plus the server's per-child rejections
    pub errors: Vec<ChildMoveError>,

    /// Version after the batch commit (unchanged if nothing was sent)
    pub version: i64,

    /// Present when the underlying save absorbed conflict rounds
    pub merged: Option<MergedSave>,
}

impl SyncSession {
    /// Run one mutation through the optimistic pipeline.
    ///
    /// # Errors
    ///
    /// - [`RuleSyncError::ValidityFailure`] - the action no longer applies
    ///   against the merged server state; the forest is left at that state
    /// - [`RuleSyncError::RetryBudgetExhausted`] - conflicts persisted
    ///   through every replay; the forest was resynced before reporting
    /// - [`RuleSyncError::Transport`] - network/server failure; no version
    ///   state was changed
    pub async fn save(&self, intent: MutationIntent) -> Result<SaveReceipt, RuleSyncError> {
        let mut state = self.state.lock().await;
        self.save_locked(&mut state, intent).await
    }

    pub(crate) async fn save_locked(
        &self,
        state: &mut SessionState,
        intent: MutationIntent,
    ) -> Result<SaveReceipt, RuleSyncError> {
        if intent.apply_optimistic(&mut state.forest) {
            self.emit(state.base_version, UpdateOrigin::Optimistic);
        }

        let endpoint = intent.endpoint();
        let payload = intent.payload();
        let mut replays: u32 = 0;
        let mut last_modifiers: u32 = 0;

        loop {
            let request = CommitRequest {
                endpoint,
                payload: payload.clone(),
                base_version: state.base_version,
                client_id: self.client_id().to_string(),
            };

            match self.transport.submit(&request).await {
                Ok(CommitOutcome::Committed(receipt)) => {
                    state.base_version = receipt.version_id;

                    // The optimistic forest is an approximation; a forced
                    // full resync guarantees the local state matches the
                    // server exactly. Failure here must not turn a committed
                    // save into an error.
                    if let Err(e) = self.sync_locked(state, true).await {
                        warn!(error = %e, "post-commit resync failed, forest may lag until next sync");
                    }

                    info!(
                        version = receipt.version_id,
                        action = %intent.describe(),
                        replays,
                        "mutation committed"
                    );
                    return Ok(SaveReceipt {
                        version: receipt.version_id,
                        new_id: receipt.new_id,
                        merged: (replays > 0).then_some(MergedSave {
                            other_editors: last_modifiers,
                            replays,
                        }),
                        moved: receipt.moved,
                        child_errors: receipt.errors,
                    });
                }

                Ok(CommitOutcome::Conflict(conflict)) => {
                    warn!(
                        base_version = request.base_version,
                        latest = conflict.latest_data.version_id,
                        unique_modifiers = conflict.unique_modifiers,
                        "version conflict"
                    );
                    last_modifiers = conflict.unique_modifiers;

                    // Silently adopt the server's latest state before deciding
                    // anything; the user is only bothered if the intent died.
                    self.adopt_snapshot(
                        state,
                        &conflict.latest_data,
                        UpdateOrigin::ConflictRecovery,
                    )
                    .await?;

                    if !intent.is_still_valid(&state.forest) {
                        return Err(RuleSyncError::validity_failure(
                            intent.describe(),
                            conflict.unique_modifiers,
                        ));
                    }

                    if replays >= MAX_REPLAY_ATTEMPTS {
                        if let Err(e) = self.sync_locked(state, true).await {
                            warn!(error = %e, "resync after exhausted retries failed");
                        }
                        return Err(RuleSyncError::retry_budget_exhausted(replays));
                    }

                    replays += 1;
                    debug!(attempt = replays, "replaying mutation against merged state");
                }

                Err(e) => {
                    // No version state changes on transport failure; roll the
                    // forest back so the optimistic apply does not linger.
                    self.restore_cached_forest(state).await;
                    return Err(e.into());
                }
            }
        }
    }

    /// Move several groups under one parent in a single request.
    ///
    /// Children whose move would cycle are rejected locally before the
    /// request is built; the server's per-child rejections are merged into
    /// the receipt. When no child survives the local check, nothing is sent
    /// at all.
    pub async fn move_many(
        &self,
        parent_id: i64,
        child_ids: &[i64],
    ) -> Result<MoveManyReceipt, RuleSyncError> {
        let mut state = self.state.lock().await;

        let (accepted, rejected) = partition_moves(&state.forest, parent_id, child_ids);
        let mut errors: Vec<ChildMoveError> = rejected
            .into_iter()
            .map(|r| ChildMoveError {
                child_id: r.child_id,
                error: r.reason,
            })
            .collect();

        if accepted.is_empty() {
            debug!(parent_id, "no batch-move candidate survived local cycle checks");
            return Ok(MoveManyReceipt {
                moved: 0,
                errors,
                version: state.base_version,
                merged: None,
            });
        }

        let sent = accepted.len() as u32;
        let receipt = self
            .save_locked(
                &mut state,
                MutationIntent::BatchMove {
                    parent_id,
                    child_ids: accepted,
                },
            )
            .await?;

        // Prefer the server's explicit moved list; otherwise infer it from
        // what was sent minus what the server rejected.
        let moved = receipt
            .moved
            .as_ref()
            .map(|m| m.len() as u32)
            .unwrap_or_else(|| sent.saturating_sub(receipt.child_errors.len() as u32));
        errors.extend(receipt.child_errors);

        Ok(MoveManyReceipt {
            moved,
            errors,
            version: receipt.version,
            merged: receipt.merged,
        })
    }
}
