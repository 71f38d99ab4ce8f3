//! Artifact Store (C2, §4.2): versioned plans and deliverables, plus the
//! conversation/task bookkeeping the Dispatcher leans on to create them.
//!
//! Every version append is monotonic (`versionNumber` increases by one),
//! `currentVersionId` always points at a live version except in the instant
//! between a version delete and its replacement, and concurrent edits to the
//! same parent are serialized with an optimistic-concurrency retry before
//! surfacing [`aegis_core::StorageError::Conflict`].

mod conversation;
mod deliverable_store;
mod event_sink;
mod plan_store;
mod task;

pub use conversation::ConversationStore;
pub use deliverable_store::DeliverableStore;
pub use event_sink::{NullStorageEventSink, StorageEventSink};
pub use plan_store::PlanStore;
pub use task::TaskStore;

/// Number of optimistic-concurrency retries attempted before a mutation
/// surfaces as [`aegis_core::StorageError::Conflict`] (§4.2 invariants).
pub const MAX_CONFLICT_RETRIES: u32 = 3;
