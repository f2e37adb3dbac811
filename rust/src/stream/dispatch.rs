//! Fan-out of decoded envelopes to consumer handlers.
//!
//! Handlers run one at a time in registration order. A failing or panicking
//! handler is logged and skipped; it never reaches the receive loop.

use std::error::Error as StdError;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{error, warn};

use crate::stream::proto::Envelope;

/// Error type handlers may return; it is only logged.
pub type HandlerError = Box<dyn StdError + Send + Sync>;

/// Consumer callback invoked once per inbound envelope.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError>;
}

/// Ordered set of handlers shared with the stream client.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn EnvelopeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn EnvelopeHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Delivers `envelope` to every handler and returns how many succeeded.
    pub async fn dispatch(&self, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for handler in &self.handlers {
            let outcome = AssertUnwindSafe(handler.handle(envelope))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => warn!(
                    event = "handler_failed",
                    handler = handler.name(),
                    message_id = envelope.message_id(),
                    error = %err
                ),
                Err(_) => error!(
                    event = "handler_panicked",
                    handler = handler.name(),
                    message_id = envelope.message_id()
                ),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|handler| handler.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use super::{EnvelopeHandler, HandlerError, HandlerRegistry};
    use crate::stream::proto::{decode, Envelope};

    struct Recorder {
        name: &'static str,
        seen: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        panic_on: Option<&'static str>,
    }

    impl Recorder {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
                fail_on: None,
                panic_on: None,
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl EnvelopeHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
            self.seen
                .lock()
                .expect("lock")
                .push(envelope.message_id().to_string());
            if self.panic_on == Some(envelope.message_id()) {
                panic!("handler blew up");
            }
            if self.fail_on == Some(envelope.message_id()) {
                return Err("tts queue full".into());
            }
            Ok(())
        }
    }

    fn keepalive(id: &str) -> Envelope {
        decode(
            &json!({
                "metadata": { "message_id": id, "message_type": "session_keepalive", "message_timestamp": "t" },
                "payload": {}
            })
            .to_string(),
        )
        .expect("decode")
    }

    #[tokio::test]
    async fn every_handler_sees_frames_in_order_despite_failures() {
        let failing = Arc::new(Recorder {
            name: "failing",
            seen: Mutex::new(Vec::new()),
            fail_on: Some("f1"),
            panic_on: None,
        });
        let panicking = Arc::new(Recorder {
            name: "panicking",
            seen: Mutex::new(Vec::new()),
            fail_on: None,
            panic_on: Some("f1"),
        });
        let steady = Recorder::new("steady");

        let mut registry = HandlerRegistry::new();
        registry.register(failing.clone());
        registry.register(panicking.clone());
        registry.register(steady.clone());
        assert_eq!(registry.len(), 3);

        let delivered: Vec<usize> = {
            let mut delivered = Vec::new();
            for id in ["f1", "f2", "f3"] {
                delivered.push(registry.dispatch(&keepalive(id)).await);
            }
            delivered
        };

        assert_eq!(delivered, vec![1, 3, 3]);
        for recorder in [&failing, &panicking, &steady] {
            assert_eq!(recorder.seen(), vec!["f1", "f2", "f3"]);
        }
    }

    #[tokio::test]
    async fn empty_registry_dispatches_nothing() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.dispatch(&keepalive("f1")).await, 0);
    }
}
