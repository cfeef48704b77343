//! Core turn-taking engine for an automated voice focus-group moderator:
//! timers, the turn controller state machine, plan navigation, session
//! orchestration, and the control-plane client.

pub mod backoff;
pub mod config;
pub mod controlplane;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod participant;
pub mod plan;
pub mod room;
pub mod shutdown;
pub mod speech;
pub mod timer;
pub mod turn;

pub use config::ModeratorConfig;
pub use controlplane::{ControlPlaneClient, HttpControlPlaneClient, SessionStatus};
pub use error::{ModeratorError, ModeratorResult};
pub use orchestrator::SessionOrchestrator;
pub use participant::Participant;
pub use plan::{DiscussionPlan, PlanCursor, PlanNavigator, Question, QuestionKind, Section};
pub use room::AudioRoom;
pub use shutdown::ShutdownWatcher;
pub use speech::{TranscriptEvent, TranscriptSource};
pub use turn::{OutcomeReason, TtsBackend, TurnController};
