//! Stand-in implementations of the out-of-scope external collaborators
//! (TTS, audio-room input switching, transcript source), so the daemon
//! binary can run end-to-end without a real voice stack wired in. Real
//! deployments replace these with backends for the actual STT/TTS engines
//! and audio-room infrastructure.

use async_trait::async_trait;
use moderator_core::{ModeratorResult, TranscriptEvent, TranscriptSource};

pub struct PlaceholderTts;

#[async_trait]
impl moderator_core::TtsBackend for PlaceholderTts {
    async fn speak(&self, text: &str) -> ModeratorResult<()> {
        tracing::info!(text, "[tts] speaking");
        Ok(())
    }
}

pub struct PlaceholderAudioRoom;

#[async_trait]
impl moderator_core::AudioRoom for PlaceholderAudioRoom {
    async fn set_active_input(&self, identity: &str) -> ModeratorResult<()> {
        tracing::debug!(identity, "[room] switching active audio input");
        Ok(())
    }
}

/// Never yields a transcript on its own; present so the binary compiles and
/// runs end-to-end with all watchers active. A real deployment wires this to
/// the STT engine's event stream instead.
#[derive(Default)]
pub struct PlaceholderTranscriptSource;

#[async_trait]
impl TranscriptSource for PlaceholderTranscriptSource {
    async fn next_event(&mut self) -> Option<TranscriptEvent> {
        std::future::pending().await
    }
}
