//! Audio-room collaborator boundary: per-participant input selection.
//!
//! Presence/connection lifecycle and the HTTP surface live outside the core;
//! this trait is the one call the Orchestrator needs from that world.

use async_trait::async_trait;

use crate::error::ModeratorResult;

#[async_trait]
pub trait AudioRoom: Send + Sync {
    /// Selects `identity` as the sole audio input the speech recognizer
    /// attends to. The collaborator admits one input stream at a time;
    /// callers treat failure as best-effort per the contract and proceed
    /// with whatever the STT currently attends to.
    async fn set_active_input(&self, identity: &str) -> ModeratorResult<()>;
}
