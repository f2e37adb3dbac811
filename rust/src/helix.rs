//! Helix HTTP client for EventSub subscriptions and user lookup.
//!
//! Every request is sent with fresh headers from the credential provider. A
//! 401 triggers exactly one refresh followed by one retry of that request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, CredentialProvider};
use crate::stream::client::StreamTarget;
use crate::stream::topics::SubscriptionRequest;

const ERROR_BODY_SNIPPET_LEN: usize = 220;
/// Production Helix API base URL.
pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HelixDefaults;

impl HelixDefaults {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
}

#[derive(Clone, Debug)]
pub struct HelixClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HelixClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: HelixDefaults::CONNECT_TIMEOUT,
            request_timeout: HelixDefaults::REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct HelixClient {
    http: Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    request_timeout: Duration,
}

impl HelixClient {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Result<Self, HelixError> {
        Self::with_options(credentials, HelixClientOptions::default())
    }

    pub fn with_options(
        credentials: Arc<dyn CredentialProvider>,
        options: HelixClientOptions,
    ) -> Result<Self, HelixError> {
        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(HelixError::Transport)?;

        Ok(Self {
            http,
            credentials,
            base_url: HELIX_BASE_URL.to_string(),
            request_timeout: options.request_timeout,
        })
    }

    /// Sets an explicit API base URL, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = base_url.trim_end().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Registers one EventSub subscription. Only `202 Accepted` succeeds.
    pub async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<(), HelixError> {
        let endpoint = self.endpoint("/eventsub/subscriptions");
        let response = self
            .send_with_refresh(|headers| {
                self.http
                    .request(Method::POST, &endpoint)
                    .headers(headers)
                    .header(CONTENT_TYPE, "application/json")
                    .json(request)
            })
            .await?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            debug!(
                event = "subscription_accepted",
                topic = %request.topic_type,
                session_id = request.session_id()
            );
            return Ok(());
        }

        let body = response.text().await.map_err(HelixError::Transport)?;
        Err(HelixError::HttpStatus {
            status,
            body: summarize_error_body(&body),
        })
    }

    /// Resolves a login name to its numeric user id.
    pub async fn get_user_id(&self, login: &str) -> Result<String, HelixError> {
        let endpoint = self.endpoint("/users");
        let response = self
            .send_with_refresh(|headers| {
                self.http
                    .request(Method::GET, &endpoint)
                    .headers(headers)
                    .query(&[("login", login)])
            })
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(HelixError::Transport)?;
        if !status.is_success() {
            return Err(HelixError::HttpStatus {
                status,
                body: summarize_error_body(&body),
            });
        }

        parse_user_id(&body, login)
    }

    /// Resolves the broadcaster and chat reader logins to user ids.
    pub async fn resolve_target(
        &self,
        broadcaster_login: &str,
        viewer_login: &str,
    ) -> Result<StreamTarget, HelixError> {
        let broadcaster_id = self.get_user_id(broadcaster_login).await?;
        let viewer_id = if viewer_login.eq_ignore_ascii_case(broadcaster_login) {
            broadcaster_id.clone()
        } else {
            self.get_user_id(viewer_login).await?
        };
        info!(
            event = "target_resolved",
            broadcaster = broadcaster_login,
            broadcaster_id = %broadcaster_id,
            viewer_id = %viewer_id
        );
        Ok(StreamTarget {
            broadcaster_id,
            viewer_id,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request, refreshing credentials and retrying once on 401.
    async fn send_with_refresh<F>(&self, build: F) -> Result<Response, HelixError>
    where
        F: Fn(HeaderMap) -> RequestBuilder,
    {
        let response = self.send_attempt(&build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(event = "helix_unauthorized", action = "refreshing access token");
        self.credentials.refresh().await?;

        let response = self.send_attempt(&build).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(HelixError::Unauthorized(summarize_error_body(&body)));
        }
        Ok(response)
    }

    async fn send_attempt<F>(&self, build: &F) -> Result<Response, HelixError>
    where
        F: Fn(HeaderMap) -> RequestBuilder,
    {
        let mut headers = HeaderMap::new();
        self.credentials.headers().await?.apply(&mut headers)?;
        build(headers)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(HelixError::Transport)
    }
}

#[derive(Debug, Error)]
pub enum HelixError {
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("still unauthorized after token refresh: {0}")]
    Unauthorized(String),

    #[error("http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("credential error: {0}")]
    Auth(#[from] AuthError),

    #[error("user {0:?} not found")]
    UserNotFound(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl HelixError {
    /// Network-level failures that may succeed on a new connection attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Unauthorized(_) | Self::Auth(_) | Self::UserNotFound(_) | Self::Parse(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    data: Vec<UserEntry>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    id: String,
}

fn parse_user_id(body: &str, login: &str) -> Result<String, HelixError> {
    let parsed: UsersResponse =
        serde_json::from_str(body).map_err(|err| HelixError::Parse(err.to_string()))?;
    parsed
        .data
        .into_iter()
        .next()
        .map(|user| user.id)
        .ok_or_else(|| HelixError::UserNotFound(login.to_string()))
}

fn summarize_error_body(body: &str) -> String {
    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match (parsed.error, parsed.message) {
            (Some(error), Some(message)) => return format!("{error}: {message}"),
            (Some(text), None) | (None, Some(text)) => return text,
            (None, None) => {}
        }
    }

    body.chars().take(ERROR_BODY_SNIPPET_LEN).collect()
}
