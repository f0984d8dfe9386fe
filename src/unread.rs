//! Unread counter shown as a badge while the chat is not visible.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnreadCounter {
    count: u32,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// A new line was added. Returns `true` if the badge changed.
    pub fn on_message(&mut self, hidden: bool) -> bool {
        if hidden {
            self.count = self.count.saturating_add(1);
        }
        hidden
    }

    /// Reset when the chat becomes visible. Returns `true` if the badge changed.
    pub fn on_visibility(&mut self, hidden: bool) -> bool {
        if hidden || self.count == 0 {
            return false;
        }
        self.count = 0;
        true
    }

    /// Badge to display; `None` clears it.
    pub fn badge(&self) -> Option<u32> {
        (self.count > 0).then_some(self.count)
    }
}
