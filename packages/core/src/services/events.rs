//! Forest Change Events
//!
//! The sync session broadcasts a [`RulesEvent`] whenever the shared forest
//! changes, so a render layer can subscribe without coupling to the sync
//! internals. Events are emitted via tokio's broadcast channel; slow
//! subscribers may lag and only ever miss intermediate states.
//!
//! Conflict replay can emit several updates in quick succession (optimistic
//! apply, conflict recovery, final resync). [`debounced`] wraps a receiver
//! in a coalescing forwarder: rapid updates inside the window collapse into
//! the latest one, and the final state update is never skipped.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Broadcast channel capacity for forest events.
///
/// 128 gives headroom for bursty replay rounds while keeping memory
/// overhead small; subscribers only need the latest state.
pub const RULES_EVENT_CHANNEL_CAPACITY: usize = 128;

/// What caused a forest update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// Speculative local apply, before the server answered
    Optimistic,
    /// The server accepted a mutation
    Committed,
    /// A full snapshot fetch replaced the forest
    Resync,
    /// A conflict response's embedded snapshot replaced the forest
    ConflictRecovery,
}

/// Forest change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulesEvent {
    ForestUpdated { version: i64, origin: UpdateOrigin },
}

/// Wrap a broadcast receiver in a debouncing forwarder.
///
/// Events arriving within `window` of each other are coalesced to the most
/// recent one. When the sender side closes, any pending event is flushed
/// before the returned channel ends, so the final state is always
/// delivered.
pub fn debounced(
    mut receiver: broadcast::Receiver<RulesEvent>,
    window: Duration,
) -> mpsc::Receiver<RulesEvent> {
    let (tx, out) = mpsc::channel(RULES_EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        'outer: loop {
            // Wait for the first event of a burst
            let mut pending = loop {
                match receiver.recv().await {
                    Ok(event) => break event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break 'outer,
                }
            };

            // Coalesce until the channel stays quiet for a full window
            loop {
                match tokio::time::timeout(window, receiver.recv()).await {
                    Ok(Ok(event)) => pending = event,
                    Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                    Ok(Err(broadcast::error::RecvError::Closed)) => {
                        let _ = tx.send(pending).await;
                        break 'outer;
                    }
                    Err(_elapsed) => break,
                }
            }

            if tx.send(pending).await.is_err() {
                break;
            }
        }
    });

    out
}
