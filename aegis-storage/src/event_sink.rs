//! Every mutating Artifact Store action must emit an observability event
//! (§4.2). Kept decoupled from `aegis-events`' concrete bus the same way
//! `aegis-llm` decouples from it: a narrow trait object the caller wires up.

use aegis_core::IdentityCapsule;
use async_trait::async_trait;

#[async_trait]
pub trait StorageEventSink: Send + Sync {
    async fn emit(&self, event_type: &str, capsule: &IdentityCapsule, payload: serde_json::Value);
}

/// No-op sink for callers (tests, or a store used standalone) that haven't
/// wired up a bus.
pub struct NullStorageEventSink;

#[async_trait]
impl StorageEventSink for NullStorageEventSink {
    async fn emit(&self, _event_type: &str, _capsule: &IdentityCapsule, _payload: serde_json::Value) {}
}
