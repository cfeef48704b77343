//! Session Orchestrator: walks the discussion plan end-to-end, invoking the
//! Turn Controller once per participant per question.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::ModeratorConfig;
use crate::controlplane::ControlPlaneClient;
use crate::error::ModeratorResult;
use crate::logging;
use crate::participant::Participant;
use crate::plan::{DiscussionPlan, PlanNavigator, Question, QuestionKind};
use crate::room::AudioRoom;
use crate::turn::{OutcomeReason, TtsBackend, TurnController};

/// The inter-question/inter-section pause the contract calls for (~2 s).
const ADVANCE_PAUSE: Duration = Duration::from_secs(2);

/// Rollcall/consent turns don't get the full question timer ladder — a
/// participant either answers promptly or is skipped.
const ROLLCALL_TIMEOUT: Duration = Duration::from_secs(4);

pub struct SessionOrchestrator<T: TtsBackend + 'static, R: AudioRoom, C: ControlPlaneClient> {
    plan: DiscussionPlan,
    participants: Vec<Participant>,
    session_id: String,
    tts: Arc<T>,
    room: Arc<R>,
    control_plane: Arc<C>,
    turn_controller: Arc<TurnController<T>>,
    session_ended_rx: watch::Receiver<bool>,
}

impl<T: TtsBackend + 'static, R: AudioRoom, C: ControlPlaneClient> SessionOrchestrator<T, R, C> {
    pub fn new(
        plan: DiscussionPlan,
        participants: Vec<Participant>,
        session_id: impl Into<String>,
        tts: Arc<T>,
        room: Arc<R>,
        control_plane: Arc<C>,
        config: ModeratorConfig,
        session_ended_rx: watch::Receiver<bool>,
    ) -> Self {
        let turn_controller = Arc::new(TurnController::new(tts.clone(), config, session_ended_rx.clone()));
        Self {
            plan,
            participants,
            session_id: session_id.into(),
            tts,
            room,
            control_plane,
            turn_controller,
            session_ended_rx,
        }
    }

    /// Exposes the Turn Controller so an external event pump feeding
    /// transcripts can reach `on_transcript` directly, concurrently with
    /// `run`.
    pub fn turn_controller(&self) -> Arc<TurnController<T>> {
        self.turn_controller.clone()
    }

    async fn is_reachable(&self, identity: &str) -> bool {
        match self.control_plane.list_room_participants(&self.session_id).await {
            Ok(list) => list.iter().any(|p| p.identity == identity),
            Err(_) => true,
        }
    }

    /// Drives the plan to completion or until the session ends externally.
    pub async fn run(&mut self, group_type: Option<String>) -> ModeratorResult<()> {
        let plan = self.plan.clone();
        let mut navigator = PlanNavigator::new(&plan, group_type);
        let mut first_participant_overall = true;

        while let Some((section, question)) = navigator.current() {
            if *self.session_ended_rx.borrow() {
                break;
            }

            if navigator.section_script_pending() {
                if let Some(script) = &section.script_md {
                    let _ = self.tts.speak(script).await;
                }
                navigator.mark_section_script_read();
                tokio::time::sleep(ADVANCE_PAUSE).await;
            }

            logging::emit_question_begin(&question.id);

            let session_ended = self
                .run_question(question, &mut first_participant_overall)
                .await?;
            if session_ended {
                return Ok(());
            }

            logging::emit_question_advanced(&question.id);
            navigator.advance();
        }
        Ok(())
    }

    async fn run_question(&mut self, question: &Question, first_participant_overall: &mut bool) -> ModeratorResult<bool> {
        match question.kind {
            QuestionKind::Info | QuestionKind::Closing => {
                if let Some(script) = &question.script_md {
                    let _ = self.tts.speak(script).await;
                }
                tokio::time::sleep(ADVANCE_PAUSE).await;
                Ok(false)
            }
            QuestionKind::Rollcall => self.run_rollcall(question).await,
            QuestionKind::Question => {
                if let Some(text) = &question.text {
                    let _ = self.tts.speak(text).await;
                }
                let participants = self.participants.clone();
                for participant in &participants {
                    if !self.is_reachable(&participant.identity).await {
                        tracing::info!(participant = %participant.identity, "skipping unreachable participant");
                        continue;
                    }
                    if self.ask_participant(participant, question, first_participant_overall).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    async fn run_rollcall(&mut self, question: &Question) -> ModeratorResult<bool> {
        if let Some(text) = &question.text {
            let _ = self.tts.speak(text).await;
        }
        let participants = self.participants.clone();
        for participant in &participants {
            if !self.is_reachable(&participant.identity).await {
                tracing::info!(participant = %participant.identity, "skipping unreachable participant");
                continue;
            }
            let _ = self.room.set_active_input(&participant.identity).await;
            let consent_line = format!("{}, please say yes to confirm your consent.", participant.display_name);
            let _ = self.tts.speak(&consent_line).await;

            self.turn_controller
                .start_rollcall_turn(&participant.identity, &participant.display_name, &question.id, ROLLCALL_TIMEOUT)
                .await;
            let (got_response, _, reason) = self.turn_controller.run_turn().await;
            tracing::info!(participant = %participant.identity, got_response, reason = ?reason, "rollcall response recorded");
            if reason == OutcomeReason::SessionEnded {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Addresses one participant for one standard question, tolerating up
    /// to two repeat-request cycles. Returns whether the session ended.
    async fn ask_participant(
        &self,
        participant: &Participant,
        question: &Question,
        first_participant_overall: &mut bool,
    ) -> ModeratorResult<bool> {
        let _ = self.room.set_active_input(&participant.identity).await;

        let cue = if *first_participant_overall {
            *first_participant_overall = false;
            format!("Let's start with you, {}…", participant.display_name)
        } else {
            format!("Thank you for sharing. {}, I'd like to hear from you now.", participant.display_name)
        };
        let _ = self.tts.speak(&cue).await;

        let mut repeats = 0u32;
        loop {
            self.turn_controller
                .start_turn(&participant.identity, &participant.display_name, &question.id)
                .await;
            let (_, _, reason) = self.turn_controller.run_turn().await;

            match reason {
                OutcomeReason::SessionEnded => return Ok(true),
                OutcomeReason::SilenceSkip => {
                    let _ = self.tts.speak("No worries — let's come back if we have time.").await;
                    return Ok(false);
                }
                OutcomeReason::Wrapup => {
                    let _ = self.tts.speak("Got it — thank you.").await;
                    return Ok(false);
                }
                OutcomeReason::Repeat => {
                    repeats += 1;
                    if repeats >= 2 {
                        let _ = self.tts.speak("Let's move on for now — we can circle back later.").await;
                        return Ok(false);
                    }
                    if let Some(text) = &question.text {
                        let _ = self.tts.speak(text).await;
                    }
                }
                OutcomeReason::Answer | OutcomeReason::External => return Ok(false),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{CreateSessionResponse, JoinRequest, JoinResponse, SessionStatus, StartResponse};
    use crate::error::ModeratorResult as Result;
    use crate::plan::{PlanMeta, Section};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct RecordingTts {
        lines: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl TtsBackend for RecordingTts {
        async fn speak(&self, text: &str) -> Result<()> {
            self.lines.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct NoopRoom;

    #[async_trait]
    impl AudioRoom for NoopRoom {
        async fn set_active_input(&self, _identity: &str) -> Result<()> {
            Ok(())
        }
    }

    struct AllPresentControlPlane {
        identities: Vec<String>,
    }

    #[async_trait]
    impl ControlPlaneClient for AllPresentControlPlane {
        async fn create_session(&self, _guide_file: Option<&str>) -> Result<CreateSessionResponse> {
            unimplemented!()
        }
        async fn join_session(&self, _session_id: &str, _req: JoinRequest<'_>) -> Result<JoinResponse> {
            unimplemented!()
        }
        async fn start_session(&self, _session_id: &str) -> Result<StartResponse> {
            unimplemented!()
        }
        async fn end_session(&self, _session_id: &str) -> Result<()> {
            unimplemented!()
        }
        async fn get_session_status(&self, _session_id: &str) -> Result<SessionStatus> {
            Ok(SessionStatus::InSession)
        }
        async fn list_room_participants(&self, _session_id: &str) -> Result<Vec<Participant>> {
            Ok(self
                .identities
                .iter()
                .map(|identity| Participant {
                    identity: identity.clone(),
                    display_name: identity.clone(),
                    is_organizer: false,
                })
                .collect())
        }
    }

    fn single_question_plan() -> DiscussionPlan {
        DiscussionPlan {
            meta: PlanMeta { title: "t".into(), duration_minutes: 10.0 },
            sections: vec![Section {
                id: "s1".into(),
                title: "Intro".into(),
                script_md: None,
                routing: None,
                cards: None,
                questions: vec![Question {
                    id: "q1".into(),
                    kind: QuestionKind::Question,
                    text: Some("How was your week?".into()),
                    script_md: None,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn advances_through_a_single_question_for_all_participants() {
        let mut config = ModeratorConfig::default();
        config.silence_prompt_seconds = 0.05;
        config.silence_grace_seconds = 0.05;

        let lines = Arc::new(StdMutex::new(Vec::new()));
        let tts = Arc::new(RecordingTts { lines: lines.clone() });
        let room = Arc::new(NoopRoom);
        let control_plane = Arc::new(AllPresentControlPlane {
            identities: vec!["p1".into(), "p2".into()],
        });
        let (_tx, rx) = watch::channel(false);

        let participants = vec![
            Participant { identity: "p1".into(), display_name: "Alex".into(), is_organizer: false },
            Participant { identity: "p2".into(), display_name: "Bo".into(), is_organizer: false },
        ];

        let mut orchestrator =
            SessionOrchestrator::new(single_question_plan(), participants, "sess-1", tts, room, control_plane, config, rx);

        orchestrator.run(None).await.unwrap();

        let spoken = lines.lock().unwrap().clone();
        assert!(spoken.iter().any(|l| l.contains("How was your week?")));
        assert!(spoken.iter().any(|l| l.contains("Let's start with you, Alex")));
        assert!(spoken.iter().any(|l| l.contains("Bo, I'd like to hear from you now")));
    }

    #[tokio::test]
    async fn unreachable_participant_is_skipped() {
        let mut config = ModeratorConfig::default();
        config.silence_prompt_seconds = 0.05;
        config.silence_grace_seconds = 0.05;

        let lines = Arc::new(StdMutex::new(Vec::new()));
        let tts = Arc::new(RecordingTts { lines: lines.clone() });
        let room = Arc::new(NoopRoom);
        let control_plane = Arc::new(AllPresentControlPlane { identities: vec!["p1".into()] });
        let (_tx, rx) = watch::channel(false);

        let participants = vec![
            Participant { identity: "p1".into(), display_name: "Alex".into(), is_organizer: false },
            Participant { identity: "p2".into(), display_name: "Bo".into(), is_organizer: false },
        ];

        let mut orchestrator =
            SessionOrchestrator::new(single_question_plan(), participants, "sess-1", tts, room, control_plane, config, rx);

        orchestrator.run(None).await.unwrap();

        let spoken = lines.lock().unwrap().clone();
        assert!(!spoken.iter().any(|l| l.contains("Bo")));
    }
}
