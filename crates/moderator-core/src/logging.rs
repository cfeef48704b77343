//! Structured log sink: one `tracing` event per mandatory event name, each
//! carrying a millisecond timestamp field explicitly, since the default
//! `tracing-subscriber` formatter does not print sub-second precision.

use chrono::Utc;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn emit_turn_start(turn_id: u64, question_id: &str) {
    tracing::info!(event = "TURN_START", ts_ms = now_ms(), turn_id, question_id, "turn started");
}

pub fn emit_turn_speech_start(turn_id: u64) {
    tracing::info!(event = "TURN_SPEECH_START", ts_ms = now_ms(), turn_id, "speech detected");
}

pub fn emit_turn_end(turn_id: u64) {
    tracing::info!(event = "TURN_END", ts_ms = now_ms(), turn_id, "turn ended");
}

pub fn emit_timer_cancelled(turn_id: u64) {
    tracing::debug!(event = "TIMER_CANCELLED", ts_ms = now_ms(), turn_id, "timers cancelled");
}

pub fn emit_silence_prompt_triggered(turn_id: u64) {
    tracing::info!(event = "SILENCE_PROMPT_TRIGGERED", ts_ms = now_ms(), turn_id, "silence prompt spoken");
}

pub fn emit_silence_skip_triggered(turn_id: u64) {
    tracing::info!(event = "SILENCE_SKIP_TRIGGERED", ts_ms = now_ms(), turn_id, "silence grace expired");
}

pub fn emit_wrapup_triggered(turn_id: u64) {
    tracing::info!(event = "WRAPUP_TRIGGERED", ts_ms = now_ms(), turn_id, "wrapup prompt spoken");
}

pub fn emit_wrapup_end_triggered(turn_id: u64) {
    tracing::info!(event = "WRAPUP_END_TRIGGERED", ts_ms = now_ms(), turn_id, "wrapup window elapsed");
}

pub fn emit_end_of_speech_detected(turn_id: u64) {
    tracing::info!(event = "END_OF_SPEECH_DETECTED", ts_ms = now_ms(), turn_id, "trailing silence threshold reached");
}

pub fn emit_transcript_discarded(turn_id: u64) {
    tracing::warn!(event = "TRANSCRIPT_DISCARDED", ts_ms = now_ms(), turn_id, "transcript received with no active turn");
}

pub fn emit_question_begin(question_id: &str) {
    tracing::info!(event = "QUESTION_BEGIN", ts_ms = now_ms(), question_id, "question begins");
}

pub fn emit_question_advanced(question_id: &str) {
    tracing::info!(event = "QUESTION_ADVANCED", ts_ms = now_ms(), question_id, "question advanced");
}

pub fn emit_shutdown_triggered(reason: &str) {
    tracing::info!(event = "SHUTDOWN_TRIGGERED", ts_ms = now_ms(), reason, "shutdown triggered");
}
