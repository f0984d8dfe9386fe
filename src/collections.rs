//! Ordered groups of records owned by the session controller.

use std::collections::HashMap;

use crate::error::RobinError;
use crate::models::{Message, User, UserClass};
use crate::validators::Attributes;

/// What happened to a collection member, for the view to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    Add(User),
    Change(User),
}

/// Room participants in discovery order, deduplicated by name.
///
/// Users are never removed; leaving a room only clears `present`.
#[derive(Debug, Default, Clone)]
pub struct Participants {
    users: Vec<User>,
    index: HashMap<String, usize>,
}

impl Participants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&User> {
        self.index.get(name).map(|&i| &self.users[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.iter()
    }

    /// Names in discovery order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(|u| u.name.as_str())
    }

    fn insert(&mut self, user: User) -> bool {
        if self.index.contains_key(&user.name) {
            return false;
        }
        self.index.insert(user.name.clone(), self.users.len());
        self.users.push(user);
        true
    }

    /// Look up `name`, creating a fresh user with `user_class` when unknown.
    /// Returns the user and whether it was just created.
    pub fn ensure(&mut self, name: &str, user_class: UserClass) -> (&mut User, bool) {
        let created = self.insert(User::new(name).with_class(user_class));
        let i = self.index[name];
        (&mut self.users[i], created)
    }

    /// Create-or-update `name` with `patch`.
    ///
    /// Returns the collection event to render, or `None` when the user
    /// already existed and nothing changed. A failing patch on a freshly
    /// created user still reports the `Add`.
    pub fn upsert(
        &mut self,
        name: &str,
        user_class: UserClass,
        patch: &Attributes,
    ) -> Result<Option<CollectionEvent>, RobinError> {
        let (user, created) = self.ensure(name, user_class);
        let result = user.set(patch);
        let snapshot = user.clone();
        match (created, result) {
            (true, Ok(_)) => Ok(Some(CollectionEvent::Add(snapshot))),
            (false, Ok(true)) => Ok(Some(CollectionEvent::Change(snapshot))),
            (false, Ok(false)) => Ok(None),
            (true, Err(e)) => {
                tracing::warn!(user = %name, error = %e, "rejected attributes for new participant");
                Ok(Some(CollectionEvent::Add(snapshot)))
            }
            (false, Err(e)) => Err(e),
        }
    }
}

/// Append-only chat log.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the new entry's position.
    pub fn push(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteType;
    use serde_json::json;

    fn patch(v: serde_json::Value) -> Attributes {
        v.as_object().cloned().unwrap()
    }

    // -- Participants --------------------------------------------------------

    #[test]
    fn test_ensure_creates_once() {
        let mut p = Participants::new();
        let (_, created) = p.ensure("alice", UserClass::User);
        assert!(created);
        let (_, created) = p.ensure("alice", UserClass::User);
        assert!(!created);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_names_in_discovery_order() {
        let mut p = Participants::new();
        p.ensure("carol", UserClass::User);
        p.ensure("alice", UserClass::User);
        p.ensure("bob", UserClass::User);
        p.ensure("alice", UserClass::User);
        let names: Vec<&str> = p.names().collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_upsert_new_user_is_add() {
        let mut p = Participants::new();
        let ev = p.upsert("alice", UserClass::User, &patch(json!({"present": true}))).unwrap();
        match ev {
            Some(CollectionEvent::Add(u)) => assert!(u.present),
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[test]
    fn test_upsert_same_state_twice_is_noop() {
        let mut p = Participants::new();
        p.upsert("alice", UserClass::User, &patch(json!({"present": true}))).unwrap();
        let ev = p.upsert("alice", UserClass::User, &patch(json!({"present": true}))).unwrap();
        assert!(ev.is_none());
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_upsert_change_reports_change() {
        let mut p = Participants::new();
        p.upsert("alice", UserClass::User, &patch(json!({"present": true}))).unwrap();
        let ev = p.upsert("alice", UserClass::User, &patch(json!({"vote": "CONTINUE"}))).unwrap();
        match ev {
            Some(CollectionEvent::Change(u)) => assert_eq!(u.vote, VoteType::Continue),
            other => panic!("expected Change, got {other:?}"),
        }
    }

    #[test]
    fn test_upsert_invalid_patch_on_existing_user_errors_and_keeps_state() {
        let mut p = Participants::new();
        p.upsert("alice", UserClass::User, &patch(json!({"vote": "ABANDON"}))).unwrap();
        assert!(p.upsert("alice", UserClass::User, &patch(json!({"vote": "??"}))).is_err());
        assert_eq!(p.get("alice").unwrap().vote, VoteType::Abandon);
    }

    #[test]
    fn test_get_unknown_is_none() {
        assert!(Participants::new().get("ghost").is_none());
    }

    // -- MessageLog ----------------------------------------------------------

    #[test]
    fn test_message_log_appends_in_order() {
        let mut log = MessageLog::new();
        assert!(log.is_empty());
        let i0 = log.push(Message::system("one").unwrap());
        let i1 = log.push(Message::system("two").unwrap());
        assert_eq!((i0, i1), (0, 1));
        assert_eq!(log.get(0).unwrap().message, "one");
        assert_eq!(log.last().unwrap().message, "two");
        assert_eq!(log.len(), 2);
    }
}
