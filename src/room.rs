//! Room controller: outbound room actions and their lifecycle events.
//!
//! Every action that passes local validation produces, in order,
//! `request:<action>` + `request`, then exactly one terminal pair:
//! `success:<action>` + `success` or `error:<action>` + `error`. Validation
//! failures produce `invalid:<action>` + `invalid` and never reach the API.
//! Nothing is retried; the session decides what to do with a failure.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{api_errors_from_response, RobinApi};
use crate::error::{RobinError, ValidationError};
use crate::models::{Message, Record, Room, Vote, VoteType};
use crate::validators::Attributes;

/// The outbound actions a room supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomAction {
    Message,
    Vote,
}

impl RoomAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomAction::Message => "message",
            RoomAction::Vote => "vote",
        }
    }
}

impl std::fmt::Display for RoomAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events emitted by [`RoomController`].
#[derive(Debug)]
pub enum RoomEvent {
    /// Local validation rejected the payload; no request was made.
    Invalid {
        action: RoomAction,
        error: ValidationError,
    },
    /// A request is about to be sent.
    Request { action: RoomAction },
    /// The server accepted the action. `data` is the merged body that was sent.
    Success { action: RoomAction, data: Attributes },
    /// Transport failure or an application error payload. `data` is the
    /// merged body that was attempted (empty if none was built).
    Error {
        action: RoomAction,
        error: RobinError,
        data: Attributes,
    },
}

impl RoomEvent {
    pub fn action(&self) -> RoomAction {
        match self {
            RoomEvent::Invalid { action, .. }
            | RoomEvent::Request { action }
            | RoomEvent::Success { action, .. }
            | RoomEvent::Error { action, .. } => *action,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            RoomEvent::Invalid { .. } => "invalid",
            RoomEvent::Request { .. } => "request",
            RoomEvent::Success { .. } => "success",
            RoomEvent::Error { .. } => "error",
        }
    }

    /// The specific and generic event names, e.g. `["error:vote", "error"]`.
    pub fn names(&self) -> [String; 2] {
        let kind = self.kind();
        [format!("{kind}:{}", self.action()), kind.to_string()]
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RoomEvent::Success { .. } | RoomEvent::Error { .. })
    }
}

/// Owns the room record and issues its HTTP actions.
///
/// Cheap to clone: the API is shared and the event sender is a channel handle.
pub struct RoomController<A: RobinApi> {
    room: Room,
    api: Arc<A>,
    events: mpsc::UnboundedSender<RoomEvent>,
}

impl<A: RobinApi> Clone for RoomController<A> {
    fn clone(&self) -> Self {
        Self {
            room: self.room.clone(),
            api: Arc::clone(&self.api),
            events: self.events.clone(),
        }
    }
}

impl<A: RobinApi> RoomController<A> {
    pub fn new(room: Room, api: Arc<A>, events: mpsc::UnboundedSender<RoomEvent>) -> Self {
        Self { room, api, events }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn set_room_name(&mut self, name: Option<String>) {
        self.room.room_name = name;
    }

    fn emit(&self, event: RoomEvent) {
        tracing::debug!(event = %event.names()[0], room_id = %self.room.room_id, "room event");
        // The session may have shut down; nothing left to notify.
        let _ = self.events.send(event);
    }

    /// Validate a chat message payload. On `None` the failure has been emitted.
    fn prepare_message(&self, text: &str) -> Option<Attributes> {
        match Message::outbound(text) {
            Ok(message) => {
                let mut payload = Attributes::new();
                payload.insert("message".into(), Value::String(message.message));
                Some(payload)
            }
            Err(err) => {
                self.emit_invalid(RoomAction::Message, err);
                None
            }
        }
    }

    /// Validate a vote payload. On `None` the failure has been emitted.
    fn prepare_vote(&self, vote: &str, confirmed: Option<bool>) -> Option<Attributes> {
        match Vote::parse(vote) {
            Ok(vote) => {
                let mut payload = vote.attributes();
                if let Some(confirmed) = confirmed {
                    payload.insert("confirmed".into(), Value::Bool(confirmed));
                }
                Some(payload)
            }
            Err(err) => {
                self.emit_invalid(RoomAction::Vote, err);
                None
            }
        }
    }

    fn emit_invalid(&self, action: RoomAction, err: RobinError) {
        match err {
            RobinError::Validation(error) => self.emit(RoomEvent::Invalid { action, error }),
            // Decoding after a passing validation: treat like any other failure.
            other => self.emit(RoomEvent::Error {
                action,
                error: other,
                data: Attributes::new(),
            }),
        }
    }

    /// Room attributes overlaid with `payload`; payload keys win.
    ///
    /// Unset room attributes (`room_name` before the room is named) are left
    /// out of the body.
    pub fn merged_data(&self, payload: &Attributes) -> Attributes {
        let mut data = self.room.attributes();
        data.retain(|_, value| !value.is_null());
        for (key, value) in payload {
            data.insert(key.clone(), value.clone());
        }
        data
    }

    /// Post a chat message and wait for the terminal event to be emitted.
    pub async fn post_message(&self, text: &str) {
        if let Some(payload) = self.prepare_message(text) {
            self.post(RoomAction::Message, payload).await;
        }
    }

    /// Post a vote, optionally carrying the confirmation flag.
    pub async fn post_vote(&self, vote: &str, confirmed: Option<bool>) {
        if let Some(payload) = self.prepare_vote(vote, confirmed) {
            self.post(RoomAction::Vote, payload).await;
        }
    }

    /// Generic dispatch: emit `request`, call the API, emit one terminal event.
    pub async fn post(&self, action: RoomAction, payload: Attributes) {
        let data = self.merged_data(&payload);
        self.emit(RoomEvent::Request { action });

        let outcome = self
            .api
            .post_action(&self.room.room_id, action.as_str(), &data)
            .await;

        let event = match outcome {
            Ok(body) => match api_errors_from_response(&body) {
                Some(errors) => {
                    tracing::warn!(action = %action, errors = errors.len(), "room action rejected by server");
                    RoomEvent::Error {
                        action,
                        error: RobinError::Application(errors),
                        data,
                    }
                }
                None => RoomEvent::Success { action, data },
            },
            Err(e) => {
                tracing::warn!(action = %action, error = %e, "room action request failed");
                RoomEvent::Error {
                    action,
                    error: RobinError::Request(e),
                    data,
                }
            }
        };
        self.emit(event);
    }

    /// Validate synchronously, then run the request on the runtime.
    ///
    /// Invalid payloads are reported before this returns and yield `None`.
    pub fn spawn_message(&self, text: &str) -> Option<JoinHandle<()>> {
        let payload = self.prepare_message(text)?;
        let this = self.clone();
        Some(tokio::spawn(async move {
            this.post(RoomAction::Message, payload).await;
        }))
    }

    pub fn spawn_vote(&self, vote: VoteType, confirmed: Option<bool>) -> Option<JoinHandle<()>> {
        let payload = self.prepare_vote(vote.as_str(), confirmed)?;
        let this = self.clone();
        Some(tokio::spawn(async move {
            this.post(RoomAction::Vote, payload).await;
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
