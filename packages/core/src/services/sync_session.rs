//! Sync Session - Version Gate
//!
//! [`SyncSession`] owns the client's believed `base_version` and the single
//! shared [`Forest`], both guarded by one async mutex: mutations and syncs
//! against the same version read are serialized, so two optimistic applies
//! can never diverge silently. No other component writes these two values.
//!
//! The session also owns the persisted client identity token and the
//! snapshot cache plumbing: the cache is read at startup to avoid an
//! empty-tree flash, and it is the only way to answer an "unchanged" fetch
//! response, which carries no body.

use crate::cache::{SnapshotCache, KEY_BASE_VERSION, KEY_CLIENT_ID, KEY_SNAPSHOT};
use crate::models::{Forest, RuleSnapshot};
use crate::services::error::RuleSyncError;
use crate::services::events::{RulesEvent, UpdateOrigin, RULES_EVENT_CHANNEL_CAPACITY};
use crate::services::expansion;
use crate::services::tree_builder;
use crate::transport::{FetchOutcome, RuleTransport};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a synchronization round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The server is still at our `base_version`; the forest was rehydrated
    /// from the local cache
    Unchanged,
    /// A new snapshot replaced the forest
    Updated { version: i64 },
}

/// Shared mutable session state: the only two values the whole design
/// revolves around
pub(crate) struct SessionState {
    pub(crate) base_version: i64,
    pub(crate) forest: Forest,
}

/// The client's view of the shared, versioned rule forest
///
/// Passed by reference (usually `Arc`) to every component that needs it;
/// there is deliberately no ambient singleton.
///
/// # Examples
///
/// ```rust,no_run
/// use rulespace_core::cache::FileCache;
/// use rulespace_core::services::SyncSession;
/// use rulespace_core::transport::{HttpRuleTransport, TransportConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Arc::new(HttpRuleTransport::new(TransportConfig::default())?);
/// let cache = Arc::new(FileCache::open("rules_cache.json").await?);
///
/// let session = SyncSession::restore(transport, cache).await?;
/// session.sync(false).await?;
/// # Ok(())
/// # }
/// ```
pub struct SyncSession {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) transport: Arc<dyn RuleTransport>,
    cache: Arc<dyn SnapshotCache>,
    client_id: String,
    events: broadcast::Sender<RulesEvent>,
}

impl SyncSession {
    /// Restore a session from the persistent cache.
    ///
    /// Rehydrates the last known snapshot and version so the forest is
    /// usable before the first network round trip, and loads or generates
    /// the persisted client identity token.
    ///
    /// # Errors
    ///
    /// Fails only on cache I/O errors. A corrupt cached snapshot is
    /// discarded with a warning and the session starts empty at version 0;
    /// the next sync fetches a full snapshot anyway.
    pub async fn restore(
        transport: Arc<dyn RuleTransport>,
        cache: Arc<dyn SnapshotCache>,
    ) -> Result<Self, RuleSyncError> {
        let client_id = match cache.get(KEY_CLIENT_ID).await.map_err(RuleSyncError::cache)? {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                cache
                    .set(KEY_CLIENT_ID, &id)
                    .await
                    .map_err(RuleSyncError::cache)?;
                id
            }
        };

        let (base_version, forest) =
            match cache.get(KEY_SNAPSHOT).await.map_err(RuleSyncError::cache)? {
                Some(text) => match serde_json::from_str::<RuleSnapshot>(&text) {
                    Ok(snapshot) => (snapshot.version_id, tree_builder::build(&snapshot)),
                    Err(e) => {
                        warn!(error = %e, "cached snapshot is corrupt, starting empty");
                        (0, Forest::empty())
                    }
                },
                None => (0, Forest::empty()),
            };

        if let Some(cached_version) = cache
            .get(KEY_BASE_VERSION)
            .await
            .map_err(RuleSyncError::cache)?
        {
            if cached_version.parse::<i64>() != Ok(base_version) {
                warn!(
                    %cached_version,
                    snapshot_version = base_version,
                    "cached version key disagrees with cached snapshot, trusting the snapshot"
                );
            }
        }

        let (events, _) = broadcast::channel(RULES_EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            state: Mutex::new(SessionState {
                base_version,
                forest,
            }),
            transport,
            cache,
            client_id,
            events,
        })
    }

    /// Synchronize with the server.
    ///
    /// Sends the local `base_version` as a conditional precondition unless
    /// `force` is set (used after conflict recovery and for manual refresh,
    /// where a fresh snapshot must be fetched even if the local version
    /// belief is wrong).
    pub async fn sync(&self, force: bool) -> Result<SyncOutcome, RuleSyncError> {
        let mut state = self.state.lock().await;
        self.sync_locked(&mut state, force).await
    }

    pub(crate) async fn sync_locked(
        &self,
        state: &mut SessionState,
        force: bool,
    ) -> Result<SyncOutcome, RuleSyncError> {
        let precondition = if force { None } else { Some(state.base_version) };

        match self.transport.fetch(precondition).await? {
            FetchOutcome::NotModified => {
                // "Unchanged" carries no body; the forest must come from our
                // own persisted snapshot. base_version stays untouched.
                let text = self
                    .cache
                    .get(KEY_SNAPSHOT)
                    .await
                    .map_err(RuleSyncError::cache)?
                    .ok_or(RuleSyncError::MissingCachedSnapshot)?;
                let snapshot: RuleSnapshot = serde_json::from_str(&text)
                    .map_err(|e| RuleSyncError::corrupt_cache(e.to_string()))?;
                state.forest = tree_builder::build(&snapshot);
                self.emit(state.base_version, UpdateOrigin::Resync);
                Ok(SyncOutcome::Unchanged)
            }
            FetchOutcome::Snapshot(snapshot) => {
                let version = snapshot.version_id;
                self.adopt_snapshot(state, &snapshot, UpdateOrigin::Resync)
                    .await?;
                info!(version, groups = snapshot.groups.len(), "rules synchronized");
                Ok(SyncOutcome::Updated { version })
            }
        }
    }

    /// Replace the session state with an authoritative snapshot and persist
    /// it. Used by sync and by the pipeline's conflict recovery.
    pub(crate) async fn adopt_snapshot(
        &self,
        state: &mut SessionState,
        snapshot: &RuleSnapshot,
        origin: UpdateOrigin,
    ) -> Result<(), RuleSyncError> {
        state.base_version = snapshot.version_id;
        state.forest = tree_builder::build(snapshot);

        let text = serde_json::to_string(snapshot)
            .map_err(|e| RuleSyncError::corrupt_cache(e.to_string()))?;
        self.cache
            .set(KEY_SNAPSHOT, &text)
            .await
            .map_err(RuleSyncError::cache)?;
        self.cache
            .set(KEY_BASE_VERSION, &snapshot.version_id.to_string())
            .await
            .map_err(RuleSyncError::cache)?;

        self.emit(state.base_version, origin);
        Ok(())
    }

    /// Best-effort rollback to the last persisted snapshot after a transport
    /// failure; the optimistic apply must not linger on screen.
    pub(crate) async fn restore_cached_forest(&self, state: &mut SessionState) {
        match self.cache.get(KEY_SNAPSHOT).await {
            Ok(Some(text)) => match serde_json::from_str::<RuleSnapshot>(&text) {
                Ok(snapshot) => {
                    state.forest = tree_builder::build(&snapshot);
                    self.emit(state.base_version, UpdateOrigin::Resync);
                }
                Err(e) => warn!(error = %e, "cached snapshot is corrupt, keeping current forest"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "cache read failed, keeping current forest"),
        }
    }

    pub(crate) fn emit(&self, version: i64, origin: UpdateOrigin) {
        // No subscribers is fine; the UI layer may not have attached yet
        let _ = self.events.send(RulesEvent::ForestUpdated { version, origin });
    }

    /// Subscribe to forest change events (see [`crate::services::events`])
    pub fn subscribe(&self) -> broadcast::Receiver<RulesEvent> {
        self.events.subscribe()
    }

    /// The persisted client identity token
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current believed server version
    pub async fn base_version(&self) -> i64 {
        self.state.lock().await.base_version
    }

    /// Clone of the current forest
    pub async fn forest(&self) -> Forest {
        self.state.lock().await.forest.clone()
    }

    /// Expand a batch of search tokens against the current forest.
    ///
    /// The sole entry point for the search component: never fails, and the
    /// outer vector always matches the input length.
    pub async fn expand_many(&self, tokens: &[String]) -> Vec<Vec<String>> {
        let state = self.state.lock().await;
        expansion::expand_many(&state.forest, tokens)
    }

    /// Expand each term of a comma-joined exclusion group independently
    pub async fn expand_exclusion(&self, joined: &str) -> Vec<Vec<String>> {
        let state = self.state.lock().await;
        expansion::expand_exclusion(&state.forest, joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{GroupRecord, RuleSnapshot};
    use crate::transport::{CommitOutcome, CommitRequest, RuleTransport, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport serving one fixed snapshot, honoring the precondition
    struct StaticTransport {
        snapshot: RuleSnapshot,
        fetches: AtomicU32,
    }

    impl StaticTransport {
        fn new(snapshot: RuleSnapshot) -> Self {
            Self {
                snapshot,
                fetches: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RuleTransport for StaticTransport {
        async fn fetch(
            &self,
            precondition: Option<i64>,
        ) -> Result<FetchOutcome, TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if precondition == Some(self.snapshot.version_id) {
                Ok(FetchOutcome::NotModified)
            } else {
                Ok(FetchOutcome::Snapshot(self.snapshot.clone()))
            }
        }

        async fn submit(
            &self,
            _request: &CommitRequest,
        ) -> Result<CommitOutcome, TransportError> {
            unreachable!("sync tests never submit")
        }
    }

    fn server_snapshot() -> RuleSnapshot {
        RuleSnapshot {
            version_id: 5,
            groups: vec![GroupRecord {
                group_id: 1,
                group_name: "animals".into(),
                is_enabled: true,
            }],
            keywords: vec![],
            hierarchy: vec![],
        }
    }

    async fn session_with(
        snapshot: RuleSnapshot,
    ) -> (SyncSession, Arc<StaticTransport>, Arc<MemoryCache>) {
        let transport = Arc::new(StaticTransport::new(snapshot));
        let cache = Arc::new(MemoryCache::new());
        let session = SyncSession::restore(transport.clone(), cache.clone())
            .await
            .unwrap();
        (session, transport, cache)
    }

    #[tokio::test]
    async fn test_restore_generates_and_persists_client_id() {
        let (session, _transport, cache) = session_with(server_snapshot()).await;

        let stored = cache.get(KEY_CLIENT_ID).await.unwrap().unwrap();
        assert_eq!(session.client_id(), stored);

        // A second session from the same cache keeps the identity
        let transport = Arc::new(StaticTransport::new(server_snapshot()));
        let second = SyncSession::restore(transport, cache).await.unwrap();
        assert_eq!(second.client_id(), stored);
    }

    #[tokio::test]
    async fn test_restore_rehydrates_cached_snapshot_without_network() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .set(
                KEY_SNAPSHOT,
                &serde_json::to_string(&server_snapshot()).unwrap(),
            )
            .await
            .unwrap();

        let transport = Arc::new(StaticTransport::new(server_snapshot()));
        let session = SyncSession::restore(transport.clone(), cache).await.unwrap();

        assert_eq!(session.base_version().await, 5);
        assert!(session.forest().await.contains(1));
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_discards_corrupt_snapshot() {
        let cache = Arc::new(MemoryCache::new());
        cache.set(KEY_SNAPSHOT, "garbage").await.unwrap();

        let transport = Arc::new(StaticTransport::new(server_snapshot()));
        let session = SyncSession::restore(transport, cache).await.unwrap();

        assert_eq!(session.base_version().await, 0);
        assert!(session.forest().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_updates_then_unchanged_twice() {
        let (session, _transport, _cache) = session_with(server_snapshot()).await;

        assert_eq!(
            session.sync(false).await.unwrap(),
            SyncOutcome::Updated { version: 5 }
        );
        assert_eq!(session.base_version().await, 5);

        // Idempotence: no intervening server mutation, so "unchanged" twice
        // and base_version never moves
        assert_eq!(session.sync(false).await.unwrap(), SyncOutcome::Unchanged);
        assert_eq!(session.sync(false).await.unwrap(), SyncOutcome::Unchanged);
        assert_eq!(session.base_version().await, 5);
        assert!(session.forest().await.contains(1));
    }

    #[tokio::test]
    async fn test_unchanged_without_cached_snapshot_is_an_error() {
        // Server already at version 0 answers NotModified to a fresh client,
        // but there is nothing in the cache to rehydrate from
        let (session, _transport, _cache) =
            session_with(RuleSnapshot::empty(0)).await;

        assert!(matches!(
            session.sync(false).await,
            Err(RuleSyncError::MissingCachedSnapshot)
        ));
    }

    #[tokio::test]
    async fn test_force_sync_skips_precondition() {
        let (session, transport, _cache) = session_with(server_snapshot()).await;
        session.sync(false).await.unwrap();

        // A conditional sync would answer Unchanged; force bypasses it
        assert_eq!(
            session.sync(true).await.unwrap(),
            SyncOutcome::Updated { version: 5 }
        );
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expand_many_arity_from_session() {
        let (session, _transport, _cache) = session_with(server_snapshot()).await;
        session.sync(false).await.unwrap();

        let expanded = session
            .expand_many(&["animals".to_string(), "zzz".to_string()])
            .await;
        assert_eq!(expanded.len(), 2);
        assert!(expanded[0].contains(&"animals".to_string()));
    }
}
