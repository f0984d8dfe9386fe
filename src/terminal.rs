//! Colored line-oriented renderer for a terminal.

use std::io::Write;

use colored::*;

use crate::models::{Message, User, UserClass, VoteType, VOTE_TYPES};
use crate::notifications::Notification;
use crate::view::{overflow_label, ChatView};

pub struct TerminalView<W: Write> {
    out: W,
    input_enabled: bool,
    unread: Option<u32>,
    room_name: Option<String>,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            input_enabled: true,
            unread: None,
            room_name: None,
        }
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn unread(&self) -> Option<u32> {
        self.unread
    }

    pub fn room_name(&self) -> Option<&str> {
        self.room_name.as_deref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl std::fmt::Display) {
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::debug!(error = %e, "terminal write failed");
        }
    }
}

fn author_label(name: &str, class: UserClass) -> ColoredString {
    match class {
        UserClass::SelfUser => name.bright_green().bold(),
        UserClass::System => name.dimmed(),
        UserClass::User => name.cyan(),
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn add_message(&mut self, message: &Message, compact: bool) {
        let rendered = if message.user_class == UserClass::System {
            format!("{} {}", message.author.dimmed(), message.message.dimmed())
        } else if message.is_action() {
            format!(
                "{} {} {}",
                "*".magenta(),
                author_label(&message.author, message.user_class),
                message.message.italic()
            )
        } else if compact {
            let pad = " ".repeat(message.author.chars().count() + 3);
            format!("{pad}{}", message.message)
        } else {
            format!(
                "<{}> {}",
                author_label(&message.author, message.user_class),
                message.message
            )
        };
        self.line(rendered);
    }

    fn user_added(&mut self, user: &User) {
        let label = format!("+ {}", user.name);
        self.line(label.dimmed());
    }

    fn user_changed(&mut self, user: &User) {
        if !user.has_voted() {
            return;
        }
        let mark = if user.confirmed { " (confirmed)" } else { "" };
        let label = format!("{} voted {}{}", user.name, user.vote, mark);
        self.line(label.dimmed());
    }

    fn user_overflow(&mut self, hidden: usize) {
        self.line(overflow_label(hidden).dimmed());
    }

    fn set_active_vote(&mut self, vote: Option<VoteType>) {
        if let Some(vote) = vote {
            self.line(format!("your vote: {}", vote.as_str().bold()));
        }
    }

    fn set_vote_confirmed(&mut self, confirmed: bool) {
        if confirmed {
            self.line("your vote is locked in".bright_green());
        }
    }

    fn show_vote_widget(&mut self) {
        let choices: Vec<&str> = VOTE_TYPES.iter().map(VoteType::as_str).collect();
        self.line(format!("vote: {}", choices.join(" | ")).bright_yellow().bold());
    }

    fn input_disable(&mut self) {
        self.input_enabled = false;
    }

    fn input_enable(&mut self) {
        self.input_enabled = true;
    }

    fn input_clear(&mut self) {
        self.input_enabled = true;
    }

    fn set_unread(&mut self, badge: Option<u32>) {
        self.unread = badge;
    }

    fn notify(&mut self, notification: &Notification) {
        let text = format!("\x07! {}: {}", notification.title, notification.body);
        self.line(text.bright_red().bold());
    }

    fn room_renamed(&mut self, name: &str) {
        self.room_name = Some(name.to_string());
        self.line(format!("room: {}", name.bold()));
    }
}
