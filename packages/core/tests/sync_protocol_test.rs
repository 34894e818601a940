//! End-to-end protocol test over the public API
//!
//! A simulated server with a real version counter backs two independent
//! sessions; the test walks the whole lifecycle: restore, sync, concurrent
//! mutation, conflict, automatic replay, and expansion against the merged
//! state.

use async_trait::async_trait;
use rulespace_core::cache::MemoryCache;
use rulespace_core::models::{GroupRecord, KeywordRecord, RuleSnapshot};
use rulespace_core::services::{MutationIntent, SyncOutcome, SyncSession};
use rulespace_core::transport::{
    CommitOutcome, CommitReceipt, CommitRequest, ConflictPayload, FetchOutcome, MutationEndpoint,
    RuleTransport, TransportError,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A minimal in-process rules server with authoritative version bookkeeping
struct FakeServer {
    state: Mutex<ServerState>,
}

struct ServerState {
    snapshot: RuleSnapshot,
    modifiers: HashSet<String>,
    next_group_id: i64,
}

impl FakeServer {
    fn new(snapshot: RuleSnapshot) -> Self {
        let next_group_id = snapshot.groups.iter().map(|g| g.group_id).max().unwrap_or(0) + 1;
        Self {
            state: Mutex::new(ServerState {
                snapshot,
                modifiers: HashSet::new(),
                next_group_id,
            }),
        }
    }
}

#[async_trait]
impl RuleTransport for FakeServer {
    async fn fetch(&self, precondition: Option<i64>) -> Result<FetchOutcome, TransportError> {
        let state = self.state.lock().await;
        if precondition == Some(state.snapshot.version_id) {
            Ok(FetchOutcome::NotModified)
        } else {
            Ok(FetchOutcome::Snapshot(state.snapshot.clone()))
        }
    }

    async fn submit(&self, request: &CommitRequest) -> Result<CommitOutcome, TransportError> {
        let mut state = self.state.lock().await;

        if request.base_version != state.snapshot.version_id {
            return Ok(CommitOutcome::Conflict(ConflictPayload {
                latest_data: state.snapshot.clone(),
                unique_modifiers: state.modifiers.len() as u32,
            }));
        }

        state.modifiers.insert(request.client_id.clone());
        state.snapshot.version_id += 1;
        let version_id = state.snapshot.version_id;

        let new_id = match request.endpoint {
            MutationEndpoint::GroupAdd => {
                let id = state.next_group_id;
                state.next_group_id += 1;
                state.snapshot.groups.push(GroupRecord {
                    group_id: id,
                    group_name: request.payload["group_name"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    is_enabled: true,
                });
                Some(id)
            }
            MutationEndpoint::KeywordAdd => {
                state.snapshot.keywords.push(KeywordRecord {
                    group_id: request.payload["group_id"].as_i64().unwrap_or_default(),
                    keyword: request.payload["keyword"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    is_enabled: true,
                });
                None
            }
            _ => None,
        };

        Ok(CommitOutcome::Committed(CommitReceipt {
            version_id,
            new_id,
            moved: None,
            errors: vec![],
        }))
    }
}

async fn fresh_session(server: Arc<FakeServer>) -> SyncSession {
    SyncSession::restore(server, Arc::new(MemoryCache::new()))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_two_clients_converge_through_conflict_replay() {
    let server = Arc::new(FakeServer::new(RuleSnapshot {
        version_id: 1,
        groups: vec![GroupRecord {
            group_id: 1,
            group_name: "animals".to_string(),
            is_enabled: true,
        }],
        keywords: vec![],
        hierarchy: vec![],
    }));

    let alice = fresh_session(server.clone()).await;
    let bob = fresh_session(server.clone()).await;

    assert_eq!(
        alice.sync(false).await.unwrap(),
        SyncOutcome::Updated { version: 1 }
    );
    bob.sync(false).await.unwrap();

    // Alice commits first; Bob's base_version is now stale
    let alice_receipt = alice
        .save(MutationIntent::AddKeyword {
            group_id: 1,
            text: "cat".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(alice_receipt.version, 2);
    assert!(alice_receipt.merged.is_none());

    // Bob's save conflicts, merges silently, and replays
    let bob_receipt = bob
        .save(MutationIntent::AddKeyword {
            group_id: 1,
            text: "dog".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(bob_receipt.version, 3);
    let merged = bob_receipt.merged.expect("bob went through a merge");
    assert_eq!(merged.replays, 1);
    assert_eq!(merged.other_editors, 1);

    // Both clients converge on the same forest
    alice.sync(false).await.unwrap();
    assert_eq!(alice.base_version().await, 3);
    assert_eq!(bob.base_version().await, 3);
    assert!(alice.forest().await.keyword_exists(1, "dog"));
    assert!(bob.forest().await.keyword_exists(1, "cat"));

    // Expansion sees the merged synonym set on both sides
    let expanded = bob.expand_many(&["animals".to_string()]).await;
    assert_eq!(expanded.len(), 1);
    assert!(expanded[0].contains(&"cat".to_string()));
    assert!(expanded[0].contains(&"dog".to_string()));
}

#[tokio::test]
async fn test_group_add_roundtrip_assigns_server_id() {
    let server = Arc::new(FakeServer::new(RuleSnapshot::empty(1)));
    let session = fresh_session(server).await;
    session.sync(false).await.unwrap();

    let receipt = session
        .save(MutationIntent::AddGroup {
            name: "tools".to_string(),
        })
        .await
        .unwrap();

    let new_id = receipt.new_id.expect("server assigns the id");
    assert!(new_id > 0);

    // The post-commit resync replaced the provisional negative id
    let forest = session.forest().await;
    assert!(forest.contains(new_id));
    assert!(forest.ids().iter().all(|&id| id > 0));
}

#[tokio::test]
async fn test_unchanged_sync_is_idempotent_across_sessions() {
    let server = Arc::new(FakeServer::new(RuleSnapshot {
        version_id: 4,
        groups: vec![GroupRecord {
            group_id: 1,
            group_name: "animals".to_string(),
            is_enabled: true,
        }],
        keywords: vec![],
        hierarchy: vec![],
    }));

    let cache = Arc::new(MemoryCache::new());
    {
        let session = SyncSession::restore(server.clone(), cache.clone())
            .await
            .unwrap();
        session.sync(false).await.unwrap();
    }

    // A new session over the same cache starts warm and stays unchanged
    let session = SyncSession::restore(server, cache).await.unwrap();
    assert_eq!(session.base_version().await, 4);
    assert!(session.forest().await.contains(1));
    assert_eq!(session.sync(false).await.unwrap(), SyncOutcome::Unchanged);
    assert_eq!(session.sync(false).await.unwrap(), SyncOutcome::Unchanged);
}
