//! Task supervision for the stream client and consumer modules.
//!
//! The supervisor owns a [`JoinSet`] with the client run loop, the keepalive
//! watchdog, and one update loop per updatable module. Shutdown closes the
//! client through its handle, aborts the remaining tasks and terminates
//! modules in registration order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::RuntimeConfig;
use crate::module::{Module, RegisteredModule, Updatable};
use crate::retry::with_timeout;
use crate::stream::client::{EventStreamClient, StreamClientError, StreamHandle};
use crate::stream::dispatch::HandlerRegistry;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("event stream failed: {0}")]
    Stream(#[from] StreamClientError),

    #[error("supervised task failed: {0}")]
    Task(String),
}

pub struct Supervisor {
    modules: Vec<RegisteredModule>,
    handlers: HandlerRegistry,
    watchdog_interval: Duration,
    update_interval: Duration,
}

impl Supervisor {
    pub fn new(runtime: &RuntimeConfig) -> Self {
        Self::with_intervals(runtime.watchdog_interval(), runtime.update_interval())
    }

    pub fn with_intervals(watchdog_interval: Duration, update_interval: Duration) -> Self {
        Self {
            modules: Vec::new(),
            handlers: HandlerRegistry::new(),
            watchdog_interval,
            update_interval,
        }
    }

    /// Resolves the module's capabilities and registers its notification
    /// handler, if any.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        let registered = RegisteredModule::resolve(module);
        if let Some(handler) = registered.envelope_handler() {
            self.handlers.register(handler);
        }
        info!(
            event = "module_registered",
            module = %registered.name,
            notifications = registered.notifications.is_some(),
            updates = registered.updates.is_some(),
            termination = registered.termination.is_some()
        );
        self.modules.push(registered);
    }

    pub fn modules(&self) -> &[RegisteredModule] {
        &self.modules
    }

    /// Handler registry to build the stream client with.
    ///
    /// Call after every module is registered.
    pub fn handlers(&self) -> Arc<HandlerRegistry> {
        Arc::new(self.handlers.clone())
    }

    /// Runs the client and module tasks until `shutdown` resolves or the
    /// client stops.
    pub async fn run<F>(self, client: EventStreamClient, shutdown: F) -> Result<(), SupervisorError>
    where
        F: Future<Output = ()> + Send,
    {
        let handle = client.handle();
        let mut tasks: JoinSet<Result<(), StreamClientError>> = JoinSet::new();

        tasks.spawn(client.run());
        tasks.spawn(watchdog(handle.clone(), self.watchdog_interval));
        for module in &self.modules {
            if let Some(updates) = module.updates.clone() {
                tasks.spawn(update_loop(
                    module.name.clone(),
                    updates,
                    self.update_interval,
                ));
            }
        }

        tokio::pin!(shutdown);
        let outcome = tokio::select! {
            _ = &mut shutdown => {
                info!(event = "shutdown_requested");
                if with_timeout(SHUTDOWN_GRACE, handle.close()).await.is_err() {
                    warn!(event = "close_timed_out", grace_secs = SHUTDOWN_GRACE.as_secs());
                }
                Ok(())
            }
            joined = tasks.join_next() => match joined {
                Some(Ok(Ok(()))) | None => Ok(()),
                Some(Ok(Err(err))) => Err(SupervisorError::Stream(err)),
                Some(Err(err)) => Err(SupervisorError::Task(err.to_string())),
            },
        };

        tasks.abort_all();
        while tasks.join_next().await.is_some() {}

        for module in &self.modules {
            if let Some(termination) = &module.termination {
                termination.terminate().await;
                info!(event = "module_terminated", module = %module.name);
            }
        }

        if let Err(err) = &outcome {
            error!(event = "supervisor_stopped", error = %err);
        }
        outcome
    }
}

/// Polls the keepalive deadline and asks for a reconnect once it passes.
async fn watchdog(handle: StreamHandle, period: Duration) -> Result<(), StreamClientError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if handle.is_timed_out() {
            warn!(event = "keepalive_timeout");
            handle.request_reconnect()?;
        }
    }
}

async fn update_loop(
    name: String,
    module: Arc<dyn Updatable>,
    period: Duration,
) -> Result<(), StreamClientError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(err) = module.update().await {
            warn!(event = "module_update_failed", module = %name, error = %err);
        }
    }
}
