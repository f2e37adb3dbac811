//! Twitch EventSub websocket client and a small runtime for stream
//! automation modules.
//!
//! The crate is organized by concern:
//! - `stream`: EventSub websocket client, envelope codec, topic catalog and
//!   handler fan-out.
//! - `helix`: HTTP client for subscription registration and user lookup.
//! - `auth`: credential providers and OAuth token refresh.
//! - `module` / `supervisor`: consumer module capabilities and the task
//!   supervisor that drives them.
//! - `commands`: chat command alias tables.
//! - `config`: TOML configuration with environment overrides.
//! - `retry`: reconnect backoff and timeout utilities.

/// Credential providers and token refresh.
pub mod auth;
/// Chat command normalization and lookup.
pub mod commands;
/// Configuration file discovery, environment overrides and validation.
pub mod config;
/// Helix API client.
pub mod helix;
/// Consumer module capability traits.
pub mod module;
/// Backoff and timeout helpers used by the stream client.
pub mod retry;
/// EventSub stream client, protocol types and handler registry.
pub mod stream;
/// Task supervisor for the stream client and modules.
pub mod supervisor;

pub use auth::{AuthError, CredentialProvider, RefreshingCredentials, StaticCredentials};
pub use config::{ConfigError, IntegrationConfig};
pub use helix::{HelixClient, HelixError};
pub use stream::{EventStreamClient, StreamClientError, StreamHandle, StreamTarget};
pub use supervisor::{Supervisor, SupervisorError};
