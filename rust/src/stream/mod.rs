//! EventSub stream modules.
//!
//! - `client`: websocket transport, handshake, subscription and reconnect handling.
//! - `proto`: envelope codec for inbound frames.
//! - `topics`: topic catalog and subscription request bodies.
//! - `events`: typed notification payloads.
//! - `dispatch`: handler registry fed by the receive loop.
//! - `deadline`: keepalive deadline shared with watchdogs.

/// Websocket connection, lifecycle state and control handle.
pub mod client;
/// Keepalive deadline and its read-only view.
pub mod deadline;
/// Handler registry and handler trait.
pub mod dispatch;
/// Typed event payloads for each subscribed topic.
pub mod events;
/// Inbound message envelopes.
pub mod proto;
/// Topic catalog and Helix subscription bodies.
pub mod topics;

pub use client::{
    ConnectionState, EventStreamClient, ListenOutcome, ReconnectReason, Session,
    StreamClientError, StreamHandle, StreamTarget, EVENTSUB_ENDPOINT,
};
pub use dispatch::{EnvelopeHandler, HandlerError, HandlerRegistry};
pub use events::TopicEvent;
pub use proto::{Envelope, MessageType};
pub use topics::Topic;
