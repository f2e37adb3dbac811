//! Credential providers for Helix requests and the EventSub websocket.
//!
//! The stream client asks for headers before every request so that a token
//! refreshed after a 401 is picked up immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// OAuth token endpoint used for the refresh-token grant.
pub const OAUTH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Headers identifying this client to the remote service.
#[derive(Clone, Debug)]
pub struct AuthHeaders {
    /// Full `Authorization` value, e.g. `Bearer abc`.
    pub authorization: SecretString,
    pub client_id: String,
}

impl AuthHeaders {
    pub fn bearer(access_token: &SecretString, client_id: impl Into<String>) -> Self {
        Self {
            authorization: SecretString::new(format!("Bearer {}", access_token.expose_secret())),
            client_id: client_id.into(),
        }
    }

    /// Writes `Authorization` and `Client-Id` into `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        let mut authorization = HeaderValue::from_str(self.authorization.expose_secret())?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert("client-id", HeaderValue::from_str(&self.client_id)?);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials cannot be refreshed: {0}")]
    RefreshUnavailable(&'static str),

    #[error("token refresh request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token refresh rejected with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("unexpected token type {0:?}, expected \"bearer\"")]
    UnexpectedTokenType(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// Source of authorization headers.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn headers(&self) -> Result<AuthHeaders, AuthError>;

    /// Obtains a new access token; later `headers()` calls must use it.
    async fn refresh(&self) -> Result<(), AuthError>;
}

/// Fixed token that cannot be refreshed.
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    headers: AuthHeaders,
}

impl StaticCredentials {
    pub fn new(access_token: SecretString, client_id: impl Into<String>) -> Self {
        Self {
            headers: AuthHeaders::bearer(&access_token, client_id),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn headers(&self) -> Result<AuthHeaders, AuthError> {
        Ok(self.headers.clone())
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        Err(AuthError::RefreshUnavailable("static access token"))
    }
}

struct TokenPair {
    access_token: SecretString,
    refresh_token: SecretString,
}

/// User access token kept fresh through the OAuth refresh-token grant.
pub struct RefreshingCredentials {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    tokens: RwLock<TokenPair>,
}

impl RefreshingCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        access_token: SecretString,
        refresh_token: SecretString,
    ) -> Result<Self, AuthError> {
        let http = Client::builder().timeout(REFRESH_TIMEOUT).build()?;
        Ok(Self {
            http,
            token_url: OAUTH_TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret,
            tokens: RwLock::new(TokenPair {
                access_token,
                refresh_token,
            }),
        })
    }

    /// Overrides the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into().trim_end().to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: String,
}

#[async_trait]
impl CredentialProvider for RefreshingCredentials {
    async fn headers(&self) -> Result<AuthHeaders, AuthError> {
        let tokens = self.tokens.read().await;
        Ok(AuthHeaders::bearer(&tokens.access_token, &self.client_id))
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let mut tokens = self.tokens.write().await;
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", tokens.refresh_token.expose_secret().as_str()),
        ];

        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, body });
        }

        let body: TokenResponse = response.json().await?;
        if !body.token_type.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::UnexpectedTokenType(body.token_type));
        }

        tokens.access_token = SecretString::new(body.access_token);
        tokens.refresh_token = SecretString::new(body.refresh_token);
        info!(event = "access_token_refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;
    use secrecy::{ExposeSecret, SecretString};

    use super::{AuthError, AuthHeaders, CredentialProvider, StaticCredentials};

    #[test]
    fn bearer_headers_are_applied() {
        let headers = AuthHeaders::bearer(&SecretString::new("abc".to_string()), "client-1");
        assert_eq!(headers.authorization.expose_secret(), "Bearer abc");

        let mut map = HeaderMap::new();
        headers.apply(&mut map).expect("apply headers");
        assert_eq!(map.get("authorization").expect("auth").to_str().ok(), Some("Bearer abc"));
        assert!(map.get("authorization").expect("auth").is_sensitive());
        assert_eq!(map.get("client-id").expect("client id").to_str().ok(), Some("client-1"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let headers = AuthHeaders::bearer(&SecretString::new("hunter2".to_string()), "client-1");
        assert!(!format!("{headers:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn static_credentials_cannot_refresh() {
        let credentials = StaticCredentials::new(SecretString::new("abc".to_string()), "client-1");
        assert!(matches!(
            credentials.refresh().await,
            Err(AuthError::RefreshUnavailable(_))
        ));
        let headers = credentials.headers().await.expect("headers");
        assert_eq!(headers.client_id, "client-1");
    }
}
