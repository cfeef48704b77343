//! Control-plane HTTP client: session lifecycle, token minting, and
//! audio-room participant queries.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backoff::{Backoff, LogRateLimiter};
use crate::error::{ModeratorError, ModeratorResult};
use crate::participant::Participant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Waiting,
    InSession,
    Ended,
    NotFound,
}

impl SessionStatus {
    fn from_api(s: &str) -> Self {
        match s {
            "waiting" => SessionStatus::Waiting,
            "in_session" => SessionStatus::InSession,
            "ended" => SessionStatus::Ended,
            _ => SessionStatus::NotFound,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub guide_file: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionResponse {
    pub id: String,
    #[serde(rename = "roomName")]
    pub room_name: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct JoinRequest<'a> {
    #[serde(rename = "displayName")]
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    #[serde(rename = "isOrganizer")]
    pub is_organizer: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct JoinResponse {
    pub token: String,
    #[serde(rename = "roomName")]
    pub room_name: String,
    pub identity: String,
    #[serde(rename = "livekitUrl")]
    pub livekit_url: String,
}

#[derive(Debug, Deserialize)]
pub struct StartResponse {
    #[serde(rename = "agentConfirmed")]
    pub agent_confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct SessionStatusResponse {
    pub status: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Queries session status and audio-room participant presence. Failures
/// retry with exponential backoff and rate-limited logging.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn create_session(&self, guide_file: Option<&str>) -> ModeratorResult<CreateSessionResponse>;
    async fn join_session(&self, session_id: &str, req: JoinRequest<'_>) -> ModeratorResult<JoinResponse>;
    async fn start_session(&self, session_id: &str) -> ModeratorResult<StartResponse>;
    async fn end_session(&self, session_id: &str) -> ModeratorResult<()>;
    async fn get_session_status(&self, session_id: &str) -> ModeratorResult<SessionStatus>;
    async fn list_room_participants(&self, session_id: &str) -> ModeratorResult<Vec<Participant>>;
}

/// `reqwest`-backed implementation of the control-plane consumer contract.
pub struct HttpControlPlaneClient {
    base_url: String,
    http: reqwest::Client,
    backoff: Backoff,
    rate_limiter: Mutex<LogRateLimiter>,
}

impl HttpControlPlaneClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            backoff: Backoff::control_plane_default(),
            rate_limiter: Mutex::new(LogRateLimiter::new(Duration::from_secs(10))),
        }
    }

    /// Redacts everything but the scheme and host, so session/room-specific
    /// URL paths and tokens never reach plain logs.
    fn redact_url(url: &str) -> String {
        match url.split_once("://") {
            Some((scheme, rest)) => {
                let host = rest.split('/').next().unwrap_or("");
                format!("{scheme}://{host}/***")
            }
            None => "***".to_string(),
        }
    }

    async fn request_with_retry<T, F, Fut>(&self, op_name: &str, op: F) -> ModeratorResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = reqwest::Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let mut limiter = self.rate_limiter.lock().await;
                    if limiter.should_log() {
                        tracing::warn!(
                            op = op_name,
                            base_url = %Self::redact_url(&self.base_url),
                            error = %err,
                            "control-plane request failed, retrying"
                        );
                    }
                    drop(limiter);
                    if attempt >= 20 {
                        return Err(ModeratorError::ControlPlane(format!("{op_name}: {err}")));
                    }
                    tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl ControlPlaneClient for HttpControlPlaneClient {
    async fn create_session(&self, guide_file: Option<&str>) -> ModeratorResult<CreateSessionResponse> {
        let url = format!("{}/api/sessions", self.base_url);
        self.request_with_retry("create_session", || async {
            self.http
                .post(&url)
                .json(&CreateSessionRequest { guide_file })
                .send()
                .await?
                .json::<CreateSessionResponse>()
                .await
        })
        .await
    }

    async fn join_session(&self, session_id: &str, req: JoinRequest<'_>) -> ModeratorResult<JoinResponse> {
        let url = format!("{}/api/sessions/{}/join", self.base_url, session_id);
        self.http
            .post(&url)
            .json(&req)
            .send()
            .await?
            .json::<JoinResponse>()
            .await
            .map_err(ModeratorError::from)
    }

    async fn start_session(&self, session_id: &str) -> ModeratorResult<StartResponse> {
        let url = format!("{}/api/sessions/{}/start", self.base_url, session_id);
        self.request_with_retry("start_session", || async {
            self.http.post(&url).send().await?.json::<StartResponse>().await
        })
        .await
    }

    async fn end_session(&self, session_id: &str) -> ModeratorResult<()> {
        let url = format!("{}/api/sessions/{}/end", self.base_url, session_id);
        self.http
            .post(&url)
            .send()
            .await
            .map(|_| ())
            .map_err(ModeratorError::from)
    }

    async fn get_session_status(&self, session_id: &str) -> ModeratorResult<SessionStatus> {
        let url = format!("{}/api/sessions/{}/status", self.base_url, session_id);
        let resp = self
            .request_with_retry("get_session_status", || async {
                self.http.get(&url).send().await?.json::<SessionStatusResponse>().await
            })
            .await?;
        Ok(SessionStatus::from_api(&resp.status))
    }

    async fn list_room_participants(&self, session_id: &str) -> ModeratorResult<Vec<Participant>> {
        let url = format!("{}/api/sessions/{}", self.base_url, session_id);
        let resp = self
            .request_with_retry("list_room_participants", || async {
                self.http.get(&url).send().await?.json::<SessionStatusResponse>().await
            })
            .await?;
        Ok(resp
            .participants
            .into_iter()
            .map(|identity| {
                let is_organizer = false;
                Participant {
                    display_name: identity.clone(),
                    is_organizer,
                    identity,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_path_and_query() {
        let redacted = HttpControlPlaneClient::redact_url("https://rooms.example.com/livekit?token=secret");
        assert_eq!(redacted, "https://rooms.example.com/***");
    }

    #[test]
    fn session_status_maps_unknown_to_not_found() {
        assert_eq!(SessionStatus::from_api("waiting"), SessionStatus::Waiting);
        assert_eq!(SessionStatus::from_api("whatever"), SessionStatus::NotFound);
    }
}
