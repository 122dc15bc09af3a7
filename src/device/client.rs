// HTTP client for the team backend, as used by a runestone device.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::store::{Fragment, TeamSummary};

#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection problems and server-side failures. Worth retrying.
    #[error("network error: {0}")]
    TransientNetwork(String),
    /// The backend rejected the request; `message` is its own wording.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::TransientNetwork(e.to_string())
        }
    }
}

/// Outcome of reporting a solved fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Completed { fragment: Fragment, team_solved: bool },
    /// Someone got there first; carries the stored fragment.
    AlreadySolved(Fragment),
}

#[derive(Deserialize)]
struct FragmentResponse {
    fragment: Fragment,
}

#[derive(Deserialize)]
struct CompletionTeam {
    solved: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    fragment: Option<Fragment>,
    #[serde(default)]
    team: Option<CompletionTeam>,
}

pub struct TeamClient {
    http: reqwest::Client,
    base: String,
}

impl TeamClient {
    pub fn new(base: impl Into<String>) -> Self {
        let built = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build();
        Self::with_client(client_or_default(built), base)
    }

    pub fn with_client(http: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// The most recently created team, or `None` when there is none yet.
    pub async fn latest_team(&self) -> Result<Option<TeamSummary>, ClientError> {
        let response = self.http.get(self.url("/api/getLatestTeam")).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response).await?;
        Ok(Some(response.json().await?))
    }

    /// Poll until a team exists. Every failure, including "no team yet", is
    /// logged and retried after `interval`. Returns `None` only on cancel.
    pub async fn poll_active_team(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Option<TeamSummary> {
        loop {
            match self.latest_team().await {
                Ok(Some(team)) => {
                    tracing::info!("Active team: {} ({})", team.name, team.id);
                    return Some(team);
                }
                Ok(None) => tracing::info!("No active team yet, retrying"),
                Err(e) => tracing::warn!("Failed to fetch active team: {e}"),
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    pub async fn fetch_fragment(&self, team_id: &str, index: usize) -> Result<Fragment, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/api/teams/{team_id}/fragments/{index}")))
            .send()
            .await?;
        let body: FragmentResponse = check(response).await?.json().await?;
        Ok(body.fragment)
    }

    /// Report this device's fragment as solved. The server clock decides the
    /// score, so no timestamp is sent.
    pub async fn complete_fragment(
        &self,
        team_id: &str,
        index: usize,
    ) -> Result<CompletionOutcome, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/api/teams/{team_id}/runestone/{index}")))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ClientError::TransientNetwork(format!("server returned {status}")));
        }
        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        match (body.success, body.fragment) {
            (true, Some(fragment)) => Ok(CompletionOutcome::Completed {
                fragment,
                team_solved: body.team.is_some_and(|t| t.solved),
            }),
            (false, Some(fragment)) if fragment.solved => {
                Ok(CompletionOutcome::AlreadySolved(fragment))
            }
            (true, None) => Err(ClientError::Decode("completion without fragment".into())),
            (false, _) => Err(ClientError::Api {
                status: status.as_u16(),
                message: body.message.unwrap_or_else(|| status.to_string()),
            }),
        }
    }
}

/// Pass successful responses through; turn the rest into errors, keeping
/// the server's own message when it sent one.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.is_server_error() {
        return Err(ClientError::TransientNetwork(format!("server returned {status}")));
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Fall back to an untimed default client when the configured one cannot
/// be built.
fn client_or_default(built: Result<reqwest::Client, reqwest::Error>) -> reqwest::Client {
    built.unwrap_or_else(|e| {
        tracing::warn!("HTTP client setup failed ({e}); requests will have no timeout");
        reqwest::Client::default()
    })
}
