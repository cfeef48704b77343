//! The Turn Controller: a per-participant, event-driven state machine
//! coordinating cancellable timers against transcript events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::{mpsc, watch, Mutex, Notify};

use crate::config::ModeratorConfig;
use crate::error::ModeratorResult;
use crate::logging;
use crate::timer::{self, Epoch, TimerHandle};

/// Outcome classification for a completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeReason {
    Answer,
    SilenceSkip,
    Wrapup,
    Repeat,
    External,
    SessionEnded,
}

/// Internal resolution signals raced against each other by `run_turn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnSignal {
    SilenceSkip,
    AnswerComplete,
    WrapupComplete,
    TurnEnded,
    SessionEnded,
}

impl TurnSignal {
    /// Lower is higher precedence, per the tie-break order in the contract:
    /// session_ended > silence_skip > wrapup_complete > answer_complete > turn_ended.
    fn priority(self) -> u8 {
        match self {
            TurnSignal::SessionEnded => 0,
            TurnSignal::SilenceSkip => 1,
            TurnSignal::WrapupComplete => 2,
            TurnSignal::AnswerComplete => 3,
            TurnSignal::TurnEnded => 4,
        }
    }
}

/// Text-to-speech backend. Speaking suspends until playback finishes;
/// failures during shutdown are swallowed by the controller per contract.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    async fn speak(&self, text: &str) -> ModeratorResult<()>;
}

static REPEAT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\brepeat\b|\bsay that again\b|\bwhat was the question\b|\bdidn'?t (hear|understand|catch)\b|\bcouldn'?t (hear|understand)\b|\bpardon\b|\bcome again\b|\bone more time\b",
    )
    .expect("repeat pattern is a valid regex")
});

fn is_asking_to_repeat(buffer: &str) -> bool {
    REPEAT_PATTERN.is_match(buffer)
}

struct TurnInner {
    turn_id: u64,
    participant_id: String,
    display_name: String,
    question_id: String,
    has_speech: bool,
    first_speech_at: Option<Instant>,
    last_speech_at: Option<Instant>,
    silence_prompted: bool,
    wrapup_prompted: bool,
    transcript: String,
    turn_ended: bool,
    /// Rollcall/consent turns resolve on the first speech detected rather
    /// than waiting for trailing silence — "treat any speech as success".
    immediate_on_speech: bool,
}

impl TurnInner {
    fn fresh(turn_id: u64, participant_id: String, display_name: String, question_id: String) -> Self {
        Self {
            turn_id,
            participant_id,
            display_name,
            question_id,
            has_speech: false,
            first_speech_at: None,
            last_speech_at: None,
            silence_prompted: false,
            wrapup_prompted: false,
            transcript: String::new(),
            turn_ended: false,
            immediate_on_speech: false,
        }
    }
}

/// Per-session turn-taking state machine. One instance is created per
/// session and reused across every participant turn; `start_turn` resets its
/// per-turn state and bumps the epoch.
pub struct TurnController<T: TtsBackend + 'static> {
    tts: Arc<T>,
    config: ModeratorConfig,
    epoch: Epoch,
    session_ended: watch::Receiver<bool>,
    inner: Arc<Mutex<TurnInner>>,
    /// Recreated at every `start_turn`/`start_rollcall_turn` so a stray
    /// permit left by a multi-segment answer in the previous turn can never
    /// wake the next turn's max-answer watcher before its own first speech.
    speech_notify: Mutex<Arc<Notify>>,
    signal_tx: mpsc::UnboundedSender<TurnSignal>,
    signal_rx: Mutex<mpsc::UnboundedReceiver<TurnSignal>>,
    timers: Mutex<Vec<TimerHandle>>,
}

impl<T: TtsBackend + 'static> TurnController<T> {
    pub fn new(tts: Arc<T>, config: ModeratorConfig, session_ended: watch::Receiver<bool>) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            tts,
            config,
            epoch: Arc::new(AtomicU64::new(0)),
            session_ended,
            inner: Arc::new(Mutex::new(TurnInner::fresh(0, String::new(), String::new(), String::new()))),
            speech_notify: Mutex::new(Arc::new(Notify::new())),
            signal_tx,
            signal_rx: Mutex::new(signal_rx),
            timers: Mutex::new(Vec::new()),
        }
    }

    pub fn turn_id(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Cancels every outstanding timer for the current turn. Idempotent.
    pub async fn cancel_all_timers(&self) {
        let mut timers = self.timers.lock().await;
        for handle in timers.drain(..) {
            handle.cancel();
        }
        logging::emit_timer_cancelled(self.turn_id());
    }

    /// Initializes a fresh turn: cancels outstanding timers, increments
    /// turn_id, resets all per-turn fields, and arms the primary watchers.
    pub async fn start_turn(
        &self,
        participant_id: impl Into<String>,
        display_name: impl Into<String>,
        question_id: impl Into<String>,
    ) {
        let display_name = display_name.into();
        let new_epoch = self.reset_for_new_turn(participant_id, display_name.clone(), question_id, false).await;

        if !self.config.turn_timers_enabled {
            return;
        }
        let mut timers = self.timers.lock().await;
        timers.push(self.arm_silence_prompt_watcher(new_epoch, display_name));
        timers.push(self.arm_max_answer_watcher(new_epoch).await);
        timers.push(self.arm_end_of_speech_watcher(new_epoch));
    }

    /// Initializes a rollcall/consent turn: same epoch/state-reset contract
    /// as `start_turn`, but any speech resolves the turn immediately
    /// ("treat any speech as success") and silence is bounded by a single
    /// short timeout rather than the standard prompt/grace/max-answer/wrapup
    /// sequence.
    pub async fn start_rollcall_turn(
        &self,
        participant_id: impl Into<String>,
        display_name: impl Into<String>,
        question_id: impl Into<String>,
        timeout: Duration,
    ) {
        let new_epoch = self.reset_for_new_turn(participant_id, display_name.into(), question_id, true).await;

        if !self.config.turn_timers_enabled {
            return;
        }
        let mut timers = self.timers.lock().await;
        timers.push(self.arm_rollcall_timeout_watcher(new_epoch, timeout));
    }

    /// Shared reset logic for both turn-start flavors: cancels outstanding
    /// timers, bumps the epoch, resets per-turn state, drains stale signals,
    /// and recreates `speech_notify` so a permit left over from the previous
    /// turn's speech can never wake this turn's watchers before its own
    /// first speech.
    async fn reset_for_new_turn(
        &self,
        participant_id: impl Into<String>,
        display_name: String,
        question_id: impl Into<String>,
        immediate_on_speech: bool,
    ) -> u64 {
        self.cancel_all_timers().await;
        let new_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let participant_id = participant_id.into();
        let question_id = question_id.into();

        {
            let mut inner = self.inner.lock().await;
            *inner = TurnInner::fresh(new_epoch, participant_id, display_name, question_id.clone());
            inner.immediate_on_speech = immediate_on_speech;
        }

        {
            let mut rx = self.signal_rx.lock().await;
            while rx.try_recv().is_ok() {}
        }

        *self.speech_notify.lock().await = Arc::new(Notify::new());

        logging::emit_turn_start(new_epoch, &question_id);
        new_epoch
    }

    fn arm_rollcall_timeout_watcher(&self, epoch_value: u64, timeout: Duration) -> TimerHandle {
        let epoch = self.epoch.clone();
        let inner = self.inner.clone();
        let tx = self.signal_tx.clone();

        timer::arm(epoch, epoch_value, timeout, move || async move {
            let still_silent = {
                let g = inner.lock().await;
                !g.turn_ended && !g.has_speech
            };
            if still_silent {
                logging::emit_silence_skip_triggered(epoch_value);
                let _ = tx.send(TurnSignal::SilenceSkip);
            }
        })
    }

    fn arm_silence_prompt_watcher(&self, epoch_value: u64, display_name: String) -> TimerHandle {
        let epoch = self.epoch.clone();
        let inner = self.inner.clone();
        let tts = self.tts.clone();
        let tx = self.signal_tx.clone();
        let config = self.config.clone();
        let self_epoch_src: Epoch = epoch.clone();

        timer::arm(epoch, epoch_value, self.config.silence_prompt(), move || async move {
            let should_prompt = {
                let inner_guard = inner.lock().await;
                !inner_guard.turn_ended && !inner_guard.has_speech
            };
            if !should_prompt {
                return;
            }
            let line = format!("{display_name}, I'd love to hear your thoughts. Anything you'd add?");
            let _ = tts.speak(&line).await;
            {
                let mut inner_guard = inner.lock().await;
                inner_guard.silence_prompted = true;
            }
            logging::emit_silence_prompt_triggered(epoch_value);

            let grace_inner = inner.clone();
            let grace_tx = tx.clone();
            let grace_epoch = self_epoch_src.clone();
            let grace_handle = timer::arm(grace_epoch, epoch_value, config.silence_grace(), move || async move {
                let still_silent = {
                    let g = grace_inner.lock().await;
                    !g.turn_ended && !g.has_speech
                };
                if still_silent {
                    logging::emit_silence_skip_triggered(epoch_value);
                    let _ = grace_tx.send(TurnSignal::SilenceSkip);
                }
            });
            // The grace handle outlives this callback; it self-cancels via
            // epoch check and is also covered by the next start_turn's
            // cancel_all_timers sweep if still pending. Leaking the handle
            // here is safe because cancellation is driven by epoch, not by
            // handle ownership.
            std::mem::forget(grace_handle);
        })
    }

    async fn arm_max_answer_watcher(&self, epoch_value: u64) -> TimerHandle {
        let epoch = self.epoch.clone();
        let inner = self.inner.clone();
        let tts = self.tts.clone();
        let tx = self.signal_tx.clone();
        let config = self.config.clone();
        // Snapshot this turn's notify handle now, under start_turn's call —
        // it was just recreated by `reset_for_new_turn`, so a permit left
        // over from the previous turn's speech cannot be observed here.
        let notify = self.speech_notify.lock().await.clone();
        let self_epoch_src: Epoch = epoch.clone();

        let max_answer_total = self.config.max_answer();

        let join = tokio::spawn(async move {
            // A stray wake with no actual speech yet (defensive: should not
            // happen now that `notify` is turn-scoped) is handled by
            // rechecking `has_speech` under the lock and looping back.
            loop {
                notify.notified().await;
                if epoch.load(Ordering::SeqCst) != epoch_value {
                    return;
                }
                let has_speech = inner.lock().await.has_speech;
                if has_speech {
                    break;
                }
            }
            let elapsed = {
                let g = inner.lock().await;
                g.first_speech_at.map(|t| t.elapsed()).unwrap_or_default()
            };
            let remaining = max_answer_total.saturating_sub(elapsed);
            tokio::time::sleep(remaining).await;
            if epoch.load(Ordering::SeqCst) != epoch_value {
                return;
            }
            let should_wrapup = {
                let g = inner.lock().await;
                !g.turn_ended
            };
            if !should_wrapup {
                return;
            }
            let _ = tts.speak("We're almost out of time for this question — could you wrap up your thought?").await;
            {
                let mut g = inner.lock().await;
                g.wrapup_prompted = true;
            }
            logging::emit_wrapup_triggered(epoch_value);

            let wrapup_epoch = self_epoch_src.clone();
            let wrapup_tx = tx.clone();
            let wrapup_handle = timer::arm(wrapup_epoch, epoch_value, config.wrapup(), move || async move {
                logging::emit_wrapup_end_triggered(epoch_value);
                let _ = wrapup_tx.send(TurnSignal::WrapupComplete);
            });
            std::mem::forget(wrapup_handle);
        });

        TimerHandle::from_join(join)
    }

    fn arm_end_of_speech_watcher(&self, epoch_value: u64) -> TimerHandle {
        let epoch = self.epoch.clone();
        let inner = self.inner.clone();
        let tx = self.signal_tx.clone();
        let threshold = self.config.end_of_speech_silence();

        timer::arm_polling(epoch, epoch_value, Duration::from_millis(500), move || {
            let inner = inner.clone();
            let tx = tx.clone();
            async move {
                let g = inner.lock().await;
                if g.turn_ended || !g.has_speech {
                    return false;
                }
                let elapsed = g.last_speech_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= threshold {
                    logging::emit_end_of_speech_detected(g.turn_id);
                    drop(g);
                    let _ = tx.send(TurnSignal::AnswerComplete);
                    true
                } else {
                    false
                }
            }
        })
    }

    /// Called by the event pump for every non-empty transcript received
    /// while this turn is active. Cancels the silence-prompt/grace watchers
    /// (not max-answer or wrapup — long answers must still be bounded).
    pub async fn on_transcript(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut first_speech_for_rollcall = false;
        {
            let mut g = self.inner.lock().await;
            if g.turn_ended {
                logging::emit_transcript_discarded(g.turn_id);
                return;
            }
            g.transcript.push_str(text);
            g.transcript.push(' ');
            let now = Instant::now();
            if !g.has_speech {
                g.first_speech_at = Some(now);
                g.has_speech = true;
                logging::emit_turn_speech_start(g.turn_id);
                first_speech_for_rollcall = g.immediate_on_speech;
            }
            g.last_speech_at = Some(now);
        }
        self.speech_notify.lock().await.notify_one();
        // Silence-prompt/grace watchers self-disarm by observing
        // `has_speech == true` at their next check; no explicit cancel call
        // is required to satisfy the contract, since they only ever act when
        // silence still holds.
        if first_speech_for_rollcall {
            let _ = self.signal_tx.send(TurnSignal::AnswerComplete);
        }
    }

    /// Signals that the turn has ended by an external cause (not one of the
    /// controller's own watchers): e.g. the orchestrator giving up, or an
    /// audio-room disconnect.
    pub async fn end_turn_externally(&self) {
        let mut g = self.inner.lock().await;
        if g.turn_ended {
            return;
        }
        g.turn_ended = true;
        let _ = self.signal_tx.send(TurnSignal::TurnEnded);
    }

    /// Waits for exactly one terminal condition and returns the outcome.
    pub async fn run_turn(&self) -> (bool, bool, OutcomeReason) {
        if *self.session_ended.borrow() {
            self.cancel_all_timers().await;
            return (false, false, OutcomeReason::SessionEnded);
        }

        let mut session_ended_rx = self.session_ended.clone();
        let first_signal = {
            let mut rx = self.signal_rx.lock().await;
            tokio::select! {
                biased;
                changed = session_ended_rx.changed() => {
                    if changed.is_ok() && *session_ended_rx.borrow() {
                        TurnSignal::SessionEnded
                    } else {
                        rx.recv().await.unwrap_or(TurnSignal::TurnEnded)
                    }
                }
                sig = rx.recv() => sig.unwrap_or(TurnSignal::TurnEnded),
            }
        };

        // Drain any signals that arrived in the same tick and resolve ties
        // by precedence: session_ended > silence_skip > wrapup_complete >
        // answer_complete > turn_ended.
        let mut winner = first_signal;
        {
            let mut rx = self.signal_rx.lock().await;
            while let Ok(sig) = rx.try_recv() {
                if sig.priority() < winner.priority() {
                    winner = sig;
                }
            }
        }
        if *self.session_ended.borrow() && winner.priority() > TurnSignal::SessionEnded.priority() {
            winner = TurnSignal::SessionEnded;
        }

        self.cancel_all_timers().await;

        let (turn_id, has_speech, transcript) = {
            let mut g = self.inner.lock().await;
            g.turn_ended = true;
            (g.turn_id, g.has_speech, g.transcript.clone())
        };
        logging::emit_turn_end(turn_id);

        let asked_to_repeat = is_asking_to_repeat(&transcript);

        match winner {
            TurnSignal::SessionEnded => (false, false, OutcomeReason::SessionEnded),
            TurnSignal::SilenceSkip => (false, false, OutcomeReason::SilenceSkip),
            TurnSignal::WrapupComplete => (
                true,
                asked_to_repeat,
                if asked_to_repeat { OutcomeReason::Repeat } else { OutcomeReason::Wrapup },
            ),
            TurnSignal::AnswerComplete => (
                true,
                asked_to_repeat,
                if asked_to_repeat { OutcomeReason::Repeat } else { OutcomeReason::Answer },
            ),
            TurnSignal::TurnEnded => (has_speech, false, OutcomeReason::External),
        }
    }
}
