//! Rulespace Core
//!
//! This crate keeps many optimistic, offline-capable clients consistent with
//! a single authoritative version counter over a shared, hierarchical set of
//! keyword rule groups. It owns the rule-forest data model, the tree
//! builder and cycle detector, the version-gated synchronization protocol,
//! the optimistic-mutation pipeline (apply, commit, conflict, validity
//! check, bounded replay), the batch hierarchy-move planner, and the
//! keyword-expansion engine that turns search tokens into synonym closures.
//!
//! # Architecture
//!
//! - **Structural corruption is data, not failure**: cycles, self-references
//!   and orphaned edges are rejected during tree building and surfaced as
//!   conflict metadata on a best-effort forest that always renders
//! - **The server is opaque**: reached only through the [`transport`]
//!   traits; it accepts mutations carrying a `base_version` or rejects them
//!   with the latest authoritative snapshot embedded in the conflict
//! - **One shared state**: the believed `base_version` and the single
//!   [`models::Forest`] live behind the [`services::SyncSession`] mutex and
//!   are written nowhere else
//!
//! # Modules
//!
//! - [`models`] - Forest, Group, Keyword, snapshots and conflict records
//! - [`services`] - tree builder, expansion, planner, sync session, pipeline
//! - [`transport`] - rules-server contract and the HTTP implementation
//! - [`cache`] - persistent key/value collaborator for snapshot + identity

pub mod cache;
pub mod models;
pub mod services;
pub mod transport;

// Re-export commonly used types
pub use models::*;
pub use services::*;
