//! Domain records: users, chat messages, outbound votes and the room itself.
//!
//! Every record can be viewed as a JSON attribute bag ([`Record::attributes`])
//! and rebuilt from one ([`Record::build`]). Building merges the record's
//! defaults with the supplied attributes, keeps only known keys, and runs the
//! record's validation rules before decoding into typed fields. A record that
//! fails validation is never constructed, and a failed [`User::set`] leaves the
//! user untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{RobinError, ValidationError};
use crate::validators::{validate, Attributes, Rule};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Wire names of the votes a participant may submit.
pub const VOTE_TYPE_NAMES: &[&str] = &["INCREASE", "CONTINUE", "ABANDON"];

/// Wire names a user's recorded vote may take (submitted votes plus "no vote").
pub const USER_VOTE_NAMES: &[&str] = &["INCREASE", "CONTINUE", "ABANDON", "NOVOTE"];

pub const USER_CLASSES: &[&str] = &["user", "self", "system"];

pub const MESSAGE_CLASSES: &[&str] = &["message", "action"];

/// The three votes that can be submitted, in widget order.
pub const VOTE_TYPES: [VoteType; 3] = [VoteType::Increase, VoteType::Continue, VoteType::Abandon];

/// A room-lifecycle decision. `NoVote` means nothing has been cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    Increase,
    Continue,
    Abandon,
    #[default]
    NoVote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Increase => "INCREASE",
            VoteType::Continue => "CONTINUE",
            VoteType::Abandon => "ABANDON",
            VoteType::NoVote => "NOVOTE",
        }
    }

    /// Parse one of the three submittable votes, ignoring ASCII case.
    /// `NOVOTE` is not submittable and yields `None`.
    pub fn parse_submittable(s: &str) -> Option<VoteType> {
        VOTE_TYPES
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn is_submittable(&self) -> bool {
        *self != VoteType::NoVote
    }
}

impl std::fmt::Display for VoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of the author of a line or the owner of a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserClass {
    #[default]
    User,
    /// The logged-in user.
    #[serde(rename = "self")]
    SelfUser,
    System,
}

impl UserClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserClass::User => "user",
            UserClass::SelfUser => "self",
            UserClass::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageClass {
    #[default]
    Message,
    Action,
}

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// A validated attribute bag with defaults.
pub trait Record: Serialize + DeserializeOwned {
    /// Checked in order; the first failure wins.
    const RULES: &'static [Rule];

    /// Attribute defaults. Also defines the set of known keys.
    fn defaults() -> Attributes;

    /// Current state as an attribute bag.
    fn attributes(&self) -> Attributes {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Attributes::new(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate(&self.attributes(), Self::RULES)
    }

    /// Defaults overlaid with the known keys of `attrs`, validated, then decoded.
    fn build(attrs: &Attributes) -> Result<Self, RobinError> {
        let mut merged = Self::defaults();
        merge_known(&mut merged, attrs);
        validate(&merged, Self::RULES)?;
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}

/// Copy into `target` every key of `patch` that `target` already has.
pub(crate) fn merge_known(target: &mut Attributes, patch: &Attributes) {
    for (key, value) in patch {
        if let Some(slot) = target.get_mut(key) {
            *slot = value.clone();
        }
    }
}

fn object(v: Value) -> Attributes {
    match v {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A participant in the room. Keyed by `name`, which never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub user_class: UserClass,
    pub vote: VoteType,
    pub confirmed: bool,
    pub present: bool,
}

impl Record for User {
    const RULES: &'static [Rule] = &[
        Rule::is_string("name"),
        Rule::one_of("userClass", USER_CLASSES),
        Rule::one_of("vote", USER_VOTE_NAMES),
        Rule::is_bool("confirmed"),
        Rule::is_bool("present"),
    ];

    fn defaults() -> Attributes {
        object(json!({
            "name": null,
            "userClass": "user",
            "vote": "NOVOTE",
            "confirmed": false,
            "present": false,
        }))
    }
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_class: UserClass::User,
            vote: VoteType::NoVote,
            confirmed: false,
            present: false,
        }
    }

    pub fn with_class(mut self, user_class: UserClass) -> Self {
        self.user_class = user_class;
        self
    }

    pub fn has_voted(&self) -> bool {
        self.vote != VoteType::NoVote
    }

    /// Apply a partial update. Unknown keys are ignored.
    ///
    /// Returns `Ok(true)` when any attribute changed. On a validation failure
    /// the user is left exactly as it was. Attempting to change `name` is an
    /// [`RobinError::IllegalState`].
    pub fn set(&mut self, patch: &Attributes) -> Result<bool, RobinError> {
        if let Some(name) = patch.get("name") {
            if name.as_str() != Some(self.name.as_str()) {
                return Err(RobinError::IllegalState("user name is immutable"));
            }
        }

        let mut candidate = self.attributes();
        merge_known(&mut candidate, patch);
        validate(&candidate, Self::RULES)?;
        let updated: User = serde_json::from_value(Value::Object(candidate))?;

        let changed = updated != *self;
        *self = updated;
        Ok(changed)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Author shown on lines generated locally rather than by a participant.
pub const SYSTEM_AUTHOR: &str = "[robin]";

/// One line of the chat log. Author and class are copied at creation time,
/// so later changes to the author's user record do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub author: String,
    pub message: String,
    pub message_class: MessageClass,
    pub user_class: UserClass,
}

impl Message {
    pub const MAX_LENGTH: usize = 140;

    pub fn new(
        author: impl Into<String>,
        message: impl Into<String>,
        message_class: MessageClass,
        user_class: UserClass,
    ) -> Result<Self, RobinError> {
        let msg = Self {
            author: author.into(),
            message: message.into(),
            message_class,
            user_class,
        };
        msg.validate()?;
        Ok(msg)
    }

    pub fn chat(author: &str, text: &str, user_class: UserClass) -> Result<Self, RobinError> {
        Self::new(author, text, MessageClass::Message, user_class)
    }

    pub fn action(author: &str, text: &str, user_class: UserClass) -> Result<Self, RobinError> {
        Self::new(author, text, MessageClass::Action, user_class)
    }

    /// A notice attributed to the room itself.
    pub fn system(text: &str) -> Result<Self, RobinError> {
        Self::new(SYSTEM_AUTHOR, text, MessageClass::Message, UserClass::System)
    }

    /// Payload used when posting: only the text is meaningful to the server.
    pub fn outbound(text: &str) -> Result<Self, RobinError> {
        let mut attrs = Attributes::new();
        attrs.insert("message".into(), Value::String(text.to_string()));
        Self::build(&attrs)
    }

    pub fn is_action(&self) -> bool {
        self.message_class == MessageClass::Action
    }
}

impl Record for Message {
    const RULES: &'static [Rule] = &[
        Rule::string_length("message", 1, Message::MAX_LENGTH),
        Rule::one_of("messageClass", MESSAGE_CLASSES),
        Rule::one_of("userClass", USER_CLASSES),
        Rule::is_string("author"),
    ];

    fn defaults() -> Attributes {
        object(json!({
            "author": "",
            "message": "",
            "messageClass": "message",
            "userClass": "user",
        }))
    }
}

// ---------------------------------------------------------------------------
// Vote
// ---------------------------------------------------------------------------

/// Outbound vote payload. Only the three submittable types validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub vote: VoteType,
}

impl Record for Vote {
    const RULES: &'static [Rule] = &[Rule::one_of("vote", VOTE_TYPE_NAMES)];

    fn defaults() -> Attributes {
        object(json!({ "vote": "NOVOTE" }))
    }
}

impl Vote {
    /// Build from a raw vote string as typed or clicked by the user.
    pub fn parse(raw: &str) -> Result<Self, RobinError> {
        let mut attrs = Attributes::new();
        attrs.insert("vote".into(), Value::String(raw.to_string()));
        Self::build(&attrs)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// The room this session is attached to. One per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub room_name: Option<String>,
    pub api_type: String,
}

impl Record for Room {
    const RULES: &'static [Rule] = &[Rule::is_string("room_id")];

    fn defaults() -> Attributes {
        object(json!({
            "room_id": null,
            "room_name": null,
            "api_type": "json",
        }))
    }
}

impl Room {
    pub fn new(room_id: impl Into<String>, room_name: Option<String>) -> Self {
        Self {
            room_id: room_id.into(),
            room_name,
            api_type: "json".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;

    fn patch(v: Value) -> Attributes {
        object(v)
    }

    fn validation_kind(err: RobinError) -> ValidationErrorKind {
        match err {
            RobinError::Validation(v) => v.kind,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // -- VoteType ------------------------------------------------------------

    #[test]
    fn test_vote_type_wire_names() {
        assert_eq!(serde_json::to_string(&VoteType::Increase).unwrap(), "\"INCREASE\"");
        assert_eq!(serde_json::to_string(&VoteType::NoVote).unwrap(), "\"NOVOTE\"");
    }

    #[test]
    fn test_vote_type_parse_submittable_case_insensitive() {
        assert_eq!(VoteType::parse_submittable("increase"), Some(VoteType::Increase));
        assert_eq!(VoteType::parse_submittable("Abandon"), Some(VoteType::Abandon));
        assert_eq!(VoteType::parse_submittable("NOVOTE"), None);
        assert_eq!(VoteType::parse_submittable("BOGUS"), None);
    }

    #[test]
    fn test_vote_types_are_the_three_submittable() {
        assert_eq!(VOTE_TYPES.len(), 3);
        assert!(VOTE_TYPES.iter().all(VoteType::is_submittable));
    }

    #[test]
    fn test_user_class_self_wire_name() {
        assert_eq!(serde_json::to_string(&UserClass::SelfUser).unwrap(), "\"self\"");
        let back: UserClass = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(back, UserClass::System);
    }

    // -- User ----------------------------------------------------------------

    #[test]
    fn test_user_defaults() {
        let u = User::new("alice");
        assert_eq!(u.user_class, UserClass::User);
        assert_eq!(u.vote, VoteType::NoVote);
        assert!(!u.present);
        assert!(!u.confirmed);
        assert!(!u.has_voted());
        assert!(u.validate().is_ok());
    }

    #[test]
    fn test_user_build_without_name_fails_not_string() {
        let err = User::build(&Attributes::new()).unwrap_err();
        assert_eq!(validation_kind(err), ValidationErrorKind::NotString);
    }

    #[test]
    fn test_user_build_from_wire_attrs() {
        let u = User::build(&patch(json!({"name": "bob", "vote": "CONTINUE", "present": true})))
            .unwrap();
        assert_eq!(u.name, "bob");
        assert_eq!(u.vote, VoteType::Continue);
        assert!(u.present);
    }

    #[test]
    fn test_user_set_updates_and_reports_change() {
        let mut u = User::new("alice");
        assert!(u.set(&patch(json!({"present": true}))).unwrap());
        assert!(u.present);
        assert!(!u.set(&patch(json!({"present": true}))).unwrap());
    }

    #[test]
    fn test_user_set_invalid_vote_leaves_record_unchanged() {
        let mut u = User::new("alice");
        u.set(&patch(json!({"vote": "INCREASE"}))).unwrap();
        let before = u.clone();
        let err = u.set(&patch(json!({"vote": "MAYBE", "present": true}))).unwrap_err();
        assert_eq!(validation_kind(err), ValidationErrorKind::InvalidOption);
        assert_eq!(u, before);
    }

    #[test]
    fn test_user_set_invalid_class_leaves_record_unchanged() {
        let mut u = User::new("alice");
        let before = u.clone();
        assert!(u.set(&patch(json!({"userClass": "admin"}))).is_err());
        assert_eq!(u, before);
    }

    #[test]
    fn test_user_set_non_bool_present_is_not_boolean() {
        let mut u = User::new("alice");
        let err = u.set(&patch(json!({"present": "yes"}))).unwrap_err();
        assert_eq!(validation_kind(err), ValidationErrorKind::NotBoolean);
    }

    #[test]
    fn test_user_set_ignores_unknown_keys() {
        let mut u = User::new("alice");
        assert!(!u.set(&patch(json!({"color": "red"}))).unwrap());
    }

    #[test]
    fn test_user_name_is_immutable() {
        let mut u = User::new("alice");
        let err = u.set(&patch(json!({"name": "mallory"}))).unwrap_err();
        assert!(matches!(err, RobinError::IllegalState(_)));
        assert_eq!(u.name, "alice");
        // Re-stating the same name is allowed.
        assert!(u.set(&patch(json!({"name": "alice"}))).is_ok());
    }

    // -- Message -------------------------------------------------------------

    #[test]
    fn test_message_length_bounds() {
        assert!(Message::chat("a", "x", UserClass::User).is_ok());
        assert!(Message::chat("a", &"x".repeat(140), UserClass::User).is_ok());
        let empty = Message::chat("a", "", UserClass::User).unwrap_err();
        assert_eq!(validation_kind(empty), ValidationErrorKind::LengthOutOfRange);
        let long = Message::chat("a", &"x".repeat(141), UserClass::User).unwrap_err();
        assert_eq!(validation_kind(long), ValidationErrorKind::LengthOutOfRange);
    }

    #[test]
    fn test_message_system_attributes() {
        let m = Message::system("connected!").unwrap();
        assert_eq!(m.author, SYSTEM_AUTHOR);
        assert_eq!(m.user_class, UserClass::System);
        assert_eq!(m.message_class, MessageClass::Message);
    }

    #[test]
    fn test_message_action_flag() {
        assert!(Message::action("alice", "waves", UserClass::User).unwrap().is_action());
        assert!(!Message::chat("alice", "hi", UserClass::User).unwrap().is_action());
    }

    #[test]
    fn test_message_attributes_use_camel_case_keys() {
        let attrs = Message::chat("a", "hi", UserClass::SelfUser).unwrap().attributes();
        assert_eq!(attrs["messageClass"], "message");
        assert_eq!(attrs["userClass"], "self");
    }

    #[test]
    fn test_message_outbound_applies_defaults() {
        let m = Message::outbound("hello").unwrap();
        assert_eq!(m.author, "");
        assert_eq!(m.message, "hello");
    }

    // -- Vote ----------------------------------------------------------------

    #[test]
    fn test_vote_parse_valid() {
        assert_eq!(Vote::parse("ABANDON").unwrap().vote, VoteType::Abandon);
    }

    #[test]
    fn test_vote_parse_rejects_novote_and_garbage() {
        for raw in ["NOVOTE", "BOGUS", "", "increase"] {
            let err = Vote::parse(raw).unwrap_err();
            assert_eq!(validation_kind(err), ValidationErrorKind::InvalidOption, "raw={raw}");
        }
    }

    // -- Room ----------------------------------------------------------------

    #[test]
    fn test_room_attributes() {
        let room = Room::new("r1", Some("blue-room".into()));
        let attrs = room.attributes();
        assert_eq!(attrs["room_id"], "r1");
        assert_eq!(attrs["room_name"], "blue-room");
        assert_eq!(attrs["api_type"], "json");
    }

    #[test]
    fn test_room_without_name_serializes_null() {
        let attrs = Room::new("r1", None).attributes();
        assert!(attrs["room_name"].is_null());
    }
}
