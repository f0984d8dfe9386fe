//! Rendering seam between the session and whatever displays the chat.
//!
//! [`ChatView`] is the only way the session talks to the screen. Every method
//! has a no-op default so test doubles and partial renderers only override
//! what they care about. The two layout helpers hold the little bit of
//! presentation state the renderers share.

use std::collections::HashSet;

use crate::models::{Message, MessageClass, User, VoteType};
use crate::notifications::Notification;

/// Receives rendering instructions from the session controller.
///
/// Views must treat everything passed in as read-only.
pub trait ChatView {
    /// Append a line. `compact` is set when the author repeats.
    fn add_message(&mut self, _message: &Message, _compact: bool) {}

    fn user_added(&mut self, _user: &User) {}

    fn user_changed(&mut self, _user: &User) {}

    /// The user list is full; `hidden` users are not displayed.
    fn user_overflow(&mut self, _hidden: usize) {}

    /// Highlight the chosen vote button. `None` clears the highlight.
    fn set_active_vote(&mut self, _vote: Option<VoteType>) {}

    fn set_vote_confirmed(&mut self, _confirmed: bool) {}

    fn show_vote_widget(&mut self) {}

    fn input_disable(&mut self) {}

    fn input_enable(&mut self) {}

    /// Empty the input. Implies enabling it.
    fn input_clear(&mut self) {}

    fn set_unread(&mut self, _badge: Option<u32>) {}

    fn notify(&mut self, _notification: &Notification) {}

    fn close_notifications(&mut self, _closed: &[Notification]) {}

    fn room_renamed(&mut self, _name: &str) {}
}

// ---------------------------------------------------------------------------
// ChatLayout
// ---------------------------------------------------------------------------

/// Groups consecutive chat lines from the same author.
#[derive(Debug, Default, Clone)]
pub struct ChatLayout {
    last_message_from: Option<String>,
}

impl ChatLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `message` should render compact. Actions break the run.
    pub fn place(&mut self, message: &Message) -> bool {
        if message.message_class != MessageClass::Message {
            self.last_message_from = None;
            return false;
        }
        if self.last_message_from.as_deref() == Some(message.author.as_str()) {
            return true;
        }
        self.last_message_from = Some(message.author.clone());
        false
    }

    /// Forget the current run, e.g. after old lines are evicted.
    pub fn reset(&mut self) {
        self.last_message_from = None;
    }
}

// ---------------------------------------------------------------------------
// UserListLayout
// ---------------------------------------------------------------------------

/// Where a newly added user ends up in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSlot {
    Shown,
    /// Not displayed; `hidden` is the updated overflow count.
    Overflow { hidden: usize },
}

/// Caps the displayed user list and counts the rest.
#[derive(Debug, Clone)]
pub struct UserListLayout {
    max_display: usize,
    shown: HashSet<String>,
    total: usize,
}

impl Default for UserListLayout {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl UserListLayout {
    pub fn new(max_display: usize) -> Self {
        Self {
            max_display,
            shown: HashSet::new(),
            total: 0,
        }
    }

    pub fn add(&mut self, name: &str) -> UserSlot {
        self.total += 1;
        if self.total <= self.max_display {
            self.shown.insert(name.to_string());
            UserSlot::Shown
        } else {
            UserSlot::Overflow {
                hidden: self.total - self.max_display,
            }
        }
    }

    pub fn is_shown(&self, name: &str) -> bool {
        self.shown.contains(name)
    }

    pub fn hidden(&self) -> usize {
        self.total.saturating_sub(self.max_display)
    }
}

/// Text of the overflow indicator.
pub fn overflow_label(hidden: usize) -> String {
    format!("and {hidden} more")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserClass;

    fn chat(author: &str) -> Message {
        Message::chat(author, "hi", UserClass::User).unwrap()
    }

    // -- ChatLayout ----------------------------------------------------------

    #[test]
    fn test_same_author_runs_are_compact() {
        let mut layout = ChatLayout::new();
        assert!(!layout.place(&chat("alice")));
        assert!(layout.place(&chat("alice")));
        assert!(!layout.place(&chat("bob")));
        assert!(!layout.place(&chat("alice")));
    }

    #[test]
    fn test_action_breaks_run() {
        let mut layout = ChatLayout::new();
        layout.place(&chat("alice"));
        let action = Message::action("alice", "waves", UserClass::User).unwrap();
        assert!(!layout.place(&action));
        assert!(!layout.place(&chat("alice")));
    }

    #[test]
    fn test_reset_breaks_run() {
        let mut layout = ChatLayout::new();
        layout.place(&chat("alice"));
        layout.reset();
        assert!(!layout.place(&chat("alice")));
    }

    // -- UserListLayout ------------------------------------------------------

    #[test]
    fn test_user_list_overflow_counts() {
        let mut list = UserListLayout::new(2);
        assert_eq!(list.add("a"), UserSlot::Shown);
        assert_eq!(list.add("b"), UserSlot::Shown);
        assert_eq!(list.add("c"), UserSlot::Overflow { hidden: 1 });
        assert_eq!(list.add("d"), UserSlot::Overflow { hidden: 2 });
        assert!(list.is_shown("a"));
        assert!(!list.is_shown("d"));
        assert_eq!(list.hidden(), 2);
        assert_eq!(overflow_label(list.hidden()), "and 2 more");
    }

    #[test]
    fn test_user_list_unbounded_by_default() {
        let mut list = UserListLayout::default();
        for i in 0..100 {
            assert_eq!(list.add(&format!("u{i}")), UserSlot::Shown);
        }
        assert_eq!(list.hidden(), 0);
    }
}
