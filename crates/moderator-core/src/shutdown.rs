//! Background task that polls control-plane session status and triggers
//! global cancellation on `ended` or `not_found`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::controlplane::{ControlPlaneClient, SessionStatus};
use crate::logging;

pub struct ShutdownWatcher<C: ControlPlaneClient> {
    client: Arc<C>,
    session_id: String,
    session_ended_tx: watch::Sender<bool>,
    poll_period: Duration,
}

impl<C: ControlPlaneClient> ShutdownWatcher<C> {
    pub fn new(client: Arc<C>, session_id: impl Into<String>, session_ended_tx: watch::Sender<bool>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            session_ended_tx,
            poll_period: Duration::from_secs(2),
        }
    }

    #[cfg(test)]
    fn with_poll_period(mut self, period: Duration) -> Self {
        self.poll_period = period;
        self
    }

    /// Runs until the session is observed ended/not-found, or until the
    /// flag has already been raised by some other caller (e.g. a manual
    /// `POST /end`). Cancels itself by returning.
    pub async fn run(self) {
        loop {
            if *self.session_ended_tx.borrow() {
                return;
            }
            tokio::time::sleep(self.poll_period).await;
            match self.client.get_session_status(&self.session_id).await {
                Ok(SessionStatus::Ended) | Ok(SessionStatus::NotFound) => {
                    logging::emit_shutdown_triggered("session ended");
                    let _ = self.session_ended_tx.send(true);
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "shutdown watcher poll failed, will retry");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{CreateSessionResponse, JoinRequest, JoinResponse, StartResponse};
    use crate::error::ModeratorResult;
    use crate::participant::Participant;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedClient {
        responses: Vec<SessionStatus>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ControlPlaneClient for ScriptedClient {
        async fn create_session(&self, _guide_file: Option<&str>) -> ModeratorResult<CreateSessionResponse> {
            unimplemented!()
        }
        async fn join_session(&self, _session_id: &str, _req: JoinRequest<'_>) -> ModeratorResult<JoinResponse> {
            unimplemented!()
        }
        async fn start_session(&self, _session_id: &str) -> ModeratorResult<StartResponse> {
            unimplemented!()
        }
        async fn end_session(&self, _session_id: &str) -> ModeratorResult<()> {
            unimplemented!()
        }
        async fn get_session_status(&self, _session_id: &str) -> ModeratorResult<SessionStatus> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self.responses.get(i).copied().unwrap_or(SessionStatus::Ended))
        }
        async fn list_room_participants(&self, _session_id: &str) -> ModeratorResult<Vec<Participant>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn sets_session_ended_flag_on_ended_status() {
        let client = Arc::new(ScriptedClient {
            responses: vec![SessionStatus::InSession, SessionStatus::Ended],
            calls: AtomicU32::new(0),
        });
        let (tx, mut rx) = watch::channel(false);
        let watcher = ShutdownWatcher::new(client, "sess-1", tx).with_poll_period(Duration::from_millis(10));

        watcher.run().await;
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
