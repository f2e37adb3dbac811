//! Capability traits for consumer modules.
//!
//! A module declares what it can do through the accessor methods on
//! [`Module`]. The supervisor asks once, at registration, and keeps the
//! resolved capabilities.

use std::sync::Arc;

use async_trait::async_trait;

use crate::stream::dispatch::{EnvelopeHandler, HandlerError};
use crate::stream::proto::Envelope;

/// Receives every inbound envelope through the handler registry.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle_notification(&self, envelope: &Envelope) -> Result<(), HandlerError>;
}

/// Periodic work driven by the supervisor's update interval.
#[async_trait]
pub trait Updatable: Send + Sync {
    async fn update(&self) -> Result<(), HandlerError>;
}

/// Cleanup run once when the supervisor shuts down.
#[async_trait]
pub trait Terminable: Send + Sync {
    async fn terminate(&self);
}

pub trait Module: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn notifications(self: Arc<Self>) -> Option<Arc<dyn NotificationHandler>> {
        None
    }

    fn updates(self: Arc<Self>) -> Option<Arc<dyn Updatable>> {
        None
    }

    fn termination(self: Arc<Self>) -> Option<Arc<dyn Terminable>> {
        None
    }
}

/// A module with its capabilities resolved.
#[derive(Clone)]
pub struct RegisteredModule {
    pub name: String,
    pub notifications: Option<Arc<dyn NotificationHandler>>,
    pub updates: Option<Arc<dyn Updatable>>,
    pub termination: Option<Arc<dyn Terminable>>,
}

impl RegisteredModule {
    pub fn resolve(module: Arc<dyn Module>) -> Self {
        Self {
            name: module.name().to_string(),
            notifications: Arc::clone(&module).notifications(),
            updates: Arc::clone(&module).updates(),
            termination: module.termination(),
        }
    }

    /// Adapter registering the notification capability with a
    /// [`HandlerRegistry`](crate::stream::dispatch::HandlerRegistry).
    pub fn envelope_handler(&self) -> Option<Arc<dyn EnvelopeHandler>> {
        let handler = self.notifications.clone()?;
        Some(Arc::new(ModuleHandler {
            name: self.name.clone(),
            handler,
        }))
    }
}

impl std::fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("name", &self.name)
            .field("notifications", &self.notifications.is_some())
            .field("updates", &self.updates.is_some())
            .field("termination", &self.termination.is_some())
            .finish()
    }
}

struct ModuleHandler {
    name: String,
    handler: Arc<dyn NotificationHandler>,
}

#[async_trait]
impl EnvelopeHandler for ModuleHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        self.handler.handle_notification(envelope).await
    }
}
