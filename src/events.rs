//! Inbound event taxonomy: realtime pushes and local UI intents.
//!
//! Realtime frames arrive as `{"type": "<kind>", "payload": {...}}` and are
//! decoded into [`RealtimeEvent`]. Unknown kinds are kept as
//! [`RealtimeEvent::Unknown`] so the session can log and skip them.

use serde_json::Value;

use crate::models::VoteType;
use crate::notifications::Permission;

/// Server-pushed events plus the transport's connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting { delay_secs: u64 },
    Chat { from: String, body: String },
    Vote { from: String, vote: VoteType, confirmed: bool },
    Join { user: String },
    Part { user: String },
    PleaseVote,
    Merge { destination: String },
    UsersAbandoned { users: Vec<String> },
    Abandon,
    /// `body` names the subreddit created for a continuing room, when known.
    Continue { body: Option<String> },
    NoMatch,
    UpdatedName { room_name: String },
    Unknown { kind: String },
}

/// Why a frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    NotJson(String),
    #[error("frame has no 'type' field")]
    MissingType,
    #[error("'{kind}' frame is missing field '{field}'")]
    MissingField { kind: String, field: &'static str },
    #[error("'{kind}' frame has invalid vote '{value}'")]
    InvalidVote { kind: String, value: String },
}

fn str_field(payload: &Value, kind: &str, field: &'static str) -> Result<String, FrameError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FrameError::MissingField {
            kind: kind.to_string(),
            field,
        })
}

impl RealtimeEvent {
    /// Decode one text frame from the realtime channel.
    pub fn from_frame(text: &str) -> Result<Self, FrameError> {
        let parsed: Value =
            serde_json::from_str(text).map_err(|e| FrameError::NotJson(e.to_string()))?;
        let kind = parsed
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingType)?;
        let empty = Value::Object(Default::default());
        let payload = parsed.get("payload").unwrap_or(&empty);

        let event = match kind {
            "chat" => RealtimeEvent::Chat {
                from: str_field(payload, kind, "from")?,
                body: str_field(payload, kind, "body")?,
            },
            "vote" => {
                let raw = str_field(payload, kind, "vote")?;
                let vote = serde_json::from_value(Value::String(raw.clone())).map_err(|_| {
                    FrameError::InvalidVote {
                        kind: kind.to_string(),
                        value: raw,
                    }
                })?;
                RealtimeEvent::Vote {
                    from: str_field(payload, kind, "from")?,
                    vote,
                    confirmed: payload
                        .get("confirmed")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                }
            }
            "join" => RealtimeEvent::Join {
                user: str_field(payload, kind, "user")?,
            },
            "part" => RealtimeEvent::Part {
                user: str_field(payload, kind, "user")?,
            },
            "please_vote" => RealtimeEvent::PleaseVote,
            "merge" => RealtimeEvent::Merge {
                destination: str_field(payload, kind, "destination")?,
            },
            "users_abandoned" => RealtimeEvent::UsersAbandoned {
                users: payload
                    .get("users")
                    .and_then(Value::as_array)
                    .map(|users| {
                        users
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "abandon" => RealtimeEvent::Abandon,
            "continue" => RealtimeEvent::Continue {
                body: payload.get("body").and_then(Value::as_str).map(str::to_string),
            },
            "no_match" => RealtimeEvent::NoMatch,
            "updated_name" => RealtimeEvent::UpdatedName {
                room_name: str_field(payload, kind, "room_name")?,
            },
            other => RealtimeEvent::Unknown {
                kind: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Event name as the session dispatches it, e.g. `message:chat`.
    pub fn name(&self) -> String {
        let kind = match self {
            RealtimeEvent::Connecting => return "connecting".into(),
            RealtimeEvent::Connected => return "connected".into(),
            RealtimeEvent::Disconnected => return "disconnected".into(),
            RealtimeEvent::Reconnecting { .. } => return "reconnecting".into(),
            RealtimeEvent::Chat { .. } => "chat",
            RealtimeEvent::Vote { .. } => "vote",
            RealtimeEvent::Join { .. } => "join",
            RealtimeEvent::Part { .. } => "part",
            RealtimeEvent::PleaseVote => "please_vote",
            RealtimeEvent::Merge { .. } => "merge",
            RealtimeEvent::UsersAbandoned { .. } => "users_abandoned",
            RealtimeEvent::Abandon => "abandon",
            RealtimeEvent::Continue { .. } => "continue",
            RealtimeEvent::NoMatch => "no_match",
            RealtimeEvent::UpdatedName { .. } => "updated_name",
            RealtimeEvent::Unknown { kind } => kind.as_str(),
        };
        format!("message:{kind}")
    }
}

/// Intents raised by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The chat form was submitted with this text.
    Submit(String),
    VoteClicked(VoteType),
    ConfirmClicked,
    VisibilityChanged { hidden: bool },
    NotificationsToggled(bool),
    /// The host answered a notification permission request.
    PermissionResolved(Permission),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_chat_frame() {
        let ev = RealtimeEvent::from_frame(
            r#"{"type":"chat","payload":{"from":"alice","body":"/me waves"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            RealtimeEvent::Chat {
                from: "alice".into(),
                body: "/me waves".into()
            }
        );
        assert_eq!(ev.name(), "message:chat");
    }

    #[test]
    fn test_vote_frame_defaults_unconfirmed() {
        let ev = RealtimeEvent::from_frame(
            r#"{"type":"vote","payload":{"from":"bob","vote":"ABANDON"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            RealtimeEvent::Vote {
                from: "bob".into(),
                vote: VoteType::Abandon,
                confirmed: false
            }
        );
    }

    #[test]
    fn test_vote_frame_confirmed() {
        let ev = RealtimeEvent::from_frame(
            r#"{"type":"vote","payload":{"from":"bob","vote":"CONTINUE","confirmed":true}}"#,
        )
        .unwrap();
        assert!(matches!(ev, RealtimeEvent::Vote { confirmed: true, .. }));
    }

    #[test]
    fn test_vote_frame_bad_vote() {
        let err = RealtimeEvent::from_frame(
            r#"{"type":"vote","payload":{"from":"bob","vote":"MAYBE"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FrameError::InvalidVote { .. }));
    }

    #[test]
    fn test_users_abandoned_frame() {
        let ev = RealtimeEvent::from_frame(
            r#"{"type":"users_abandoned","payload":{"users":["a1","b2"]}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            RealtimeEvent::UsersAbandoned {
                users: vec!["a1".into(), "b2".into()]
            }
        );
    }

    #[rstest]
    #[case(r#"{"type":"please_vote","payload":{}}"#, RealtimeEvent::PleaseVote)]
    #[case(r#"{"type":"abandon"}"#, RealtimeEvent::Abandon)]
    #[case(r#"{"type":"no_match","payload":{}}"#, RealtimeEvent::NoMatch)]
    #[case(r#"{"type":"continue","payload":{}}"#, RealtimeEvent::Continue { body: None })]
    #[case(r#"{"type":"continue","payload":{"body":"robin_room_x"}}"#, RealtimeEvent::Continue { body: Some("robin_room_x".into()) })]
    #[case(r#"{"type":"merge","payload":{"destination":"r9"}}"#, RealtimeEvent::Merge { destination: "r9".into() })]
    #[case(r#"{"type":"join","payload":{"user":"carol"}}"#, RealtimeEvent::Join { user: "carol".into() })]
    #[case(r#"{"type":"part","payload":{"user":"carol"}}"#, RealtimeEvent::Part { user: "carol".into() })]
    #[case(r#"{"type":"updated_name","payload":{"room_name":"blue"}}"#, RealtimeEvent::UpdatedName { room_name: "blue".into() })]
    #[case(r#"{"type":"wat","payload":{}}"#, RealtimeEvent::Unknown { kind: "wat".into() })]
    fn test_frame_kinds(#[case] frame: &str, #[case] expected: RealtimeEvent) {
        assert_eq!(RealtimeEvent::from_frame(frame).unwrap(), expected);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            RealtimeEvent::from_frame("not json"),
            Err(FrameError::NotJson(_))
        ));
        assert_eq!(
            RealtimeEvent::from_frame(r#"{"payload":{}}"#).unwrap_err(),
            FrameError::MissingType
        );
        assert!(matches!(
            RealtimeEvent::from_frame(r#"{"type":"chat","payload":{"from":"a"}}"#),
            Err(FrameError::MissingField { field: "body", .. })
        ));
    }

    #[test]
    fn test_lifecycle_names_have_no_prefix() {
        assert_eq!(RealtimeEvent::Connected.name(), "connected");
        assert_eq!(RealtimeEvent::Reconnecting { delay_secs: 5 }.name(), "reconnecting");
        assert_eq!(RealtimeEvent::NoMatch.name(), "message:no_match");
    }
}
