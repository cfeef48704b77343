//! Moderator daemon: loads configuration and the discussion plan, opens a
//! control-plane session, and drives it to completion.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use moderator_core::{
    ControlPlaneClient, DiscussionPlan, HttpControlPlaneClient, ModeratorConfig, ModeratorError,
    ModeratorResult, SessionOrchestrator, ShutdownWatcher, TranscriptSource,
};
use tokio::sync::watch;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod placeholder;

use placeholder::{PlaceholderAudioRoom, PlaceholderTranscriptSource, PlaceholderTts};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "moderator exiting on unrecoverable error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ModeratorResult<()> {
    let config = ModeratorConfig::from_env();

    let guide_path: PathBuf = config
        .guide_file
        .clone()
        .ok_or_else(|| ModeratorError::Config("GUIDE_FILE is not set".into()))?
        .into();
    let plan = DiscussionPlan::load_from_file(&guide_path)?;
    tracing::info!(path = %guide_path.display(), title = %plan.meta.title, "discussion plan loaded");

    let control_plane_url = std::env::var("CONTROL_PLANE_URL")
        .map_err(|_| ModeratorError::Config("CONTROL_PLANE_URL is not set".into()))?;
    let session_id = std::env::var("SESSION_ID")
        .map_err(|_| ModeratorError::Config("SESSION_ID is not set".into()))?;

    let control_plane = Arc::new(HttpControlPlaneClient::new(control_plane_url));
    let participants = control_plane.list_room_participants(&session_id).await?;
    tracing::info!(count = participants.len(), "resolved room participants");

    let tts = Arc::new(PlaceholderTts);
    let room = Arc::new(PlaceholderAudioRoom);

    let (session_ended_tx, session_ended_rx) = watch::channel(false);

    let shutdown_watcher = ShutdownWatcher::new(control_plane.clone(), session_id.clone(), session_ended_tx);
    let shutdown_handle = tokio::spawn(shutdown_watcher.run());

    let mut orchestrator = SessionOrchestrator::new(
        plan,
        participants,
        session_id.clone(),
        tts,
        room,
        control_plane.clone(),
        config.clone(),
        session_ended_rx,
    );

    let turn_controller = orchestrator.turn_controller();
    let pump_handle = tokio::spawn(async move {
        let mut transcripts = PlaceholderTranscriptSource::default();
        while let Some(event) = transcripts.next_event().await {
            if !event.text.is_empty() {
                turn_controller.on_transcript(&event.text).await;
            }
        }
    });

    let result = orchestrator.run(config.group_type.clone()).await;

    pump_handle.abort();
    shutdown_handle.abort();

    let _ = control_plane.end_session(&session_id).await;

    result
}
