//! Speech-to-text collaborator boundary: an incremental transcript stream.

use async_trait::async_trait;

/// One transcript fragment from the external speech recognizer.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

/// Source of transcript events for whichever participant currently holds the
/// audio input slot. The event pump forwards non-empty text to the active
/// Turn Controller via `on_transcript`.
#[async_trait]
pub trait TranscriptSource: Send {
    /// Awaits the next transcript event, or `None` once the source is
    /// closed (e.g. on session shutdown).
    async fn next_event(&mut self) -> Option<TranscriptEvent>;
}
