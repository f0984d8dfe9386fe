//! Session controller: the single owner of chat state.
//!
//! Three sources feed it, processed strictly in arrival order:
//! realtime pushes ([`RealtimeEvent`]), local intents ([`UiEvent`]) and room
//! action completions ([`RoomEvent`]). Each handler mutates participants, the
//! message log or the vote state, then tells the [`ChatView`] what changed.
//! Views never mutate state directly.

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, Instant};

use crate::api::RobinApi;
use crate::collections::{CollectionEvent, MessageLog, Participants};
use crate::error::{RobinError, ValidationErrorKind};
use crate::events::{RealtimeEvent, UiEvent};
use crate::input::{parse_input, Autocomplete, Command, Input, Key};
use crate::models::{Message, Record, User, UserClass, VoteType, VOTE_TYPES};
use crate::notifications::{ellipsize, DesktopNotifier};
use crate::room::{RoomAction, RoomController, RoomEvent};
use crate::unread::UnreadCounter;
use crate::view::{ChatLayout, ChatView, UserListLayout, UserSlot};
use crate::vote::VoteState;
use crate::validators::Attributes;

/// Prefix that turns a chat line into a third-person action.
pub const ACTION_PREFIX: &str = "/me ";

/// How often expired notifications are swept while running.
const NOTIFICATION_SWEEP: Duration = Duration::from_secs(1);

// Local notices. Kept together so tests and renderers agree on wording.
pub const NOTICE_CONNECTING: &str = "connecting";
pub const NOTICE_CONNECTED: &str = "connected!";
pub const NOTICE_DISCONNECTED: &str = "disconnected :(";
pub const NOTICE_ALREADY_CONFIRMED: &str = "you have already confirmed your vote";
pub const NOTICE_INVALID_VOTE: &str = "that is not a valid vote type";
pub const NOTICE_NOT_VOTED: &str = "you have not voted yet";
pub const NOTICE_VOTE_ALREADY_CONFIRMED: &str = "your vote is already confirmed";
pub const NOTICE_POST_FAILED: &str = "something went wrong sending your message, please try again";
pub const NOTICE_VOTE_FAILED: &str = "your vote could not be recorded, please try again";
pub const NOTICE_ME_USAGE: &str = "usage: /me <action>";
pub const NOTICE_NOTIFICATIONS_BLOCKED: &str = "notifications are blocked for this client";

pub fn reconnecting_notice(delay_secs: u64) -> String {
    format!("reconnecting in {delay_secs} seconds...")
}

pub fn unknown_command_notice(name: &str) -> String {
    format!("unknown command: /{name}")
}

fn patch(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

pub struct SessionController<A: RobinApi, V: ChatView> {
    logged_in: String,
    room: RoomController<A>,
    view: V,
    participants: Participants,
    messages: MessageLog,
    vote: VoteState,
    /// A local confirmation the server has not acknowledged yet.
    pending_confirm: Option<VoteType>,
    layout: ChatLayout,
    user_list: UserListLayout,
    unread: UnreadCounter,
    notifier: DesktopNotifier,
    autocomplete: Autocomplete,
    hidden: bool,
}

impl<A: RobinApi, V: ChatView> SessionController<A, V> {
    pub fn new(
        logged_in: impl Into<String>,
        room: RoomController<A>,
        view: V,
        notifier: DesktopNotifier,
    ) -> Self {
        Self {
            logged_in: logged_in.into(),
            room,
            view,
            participants: Participants::new(),
            messages: MessageLog::new(),
            vote: VoteState::default(),
            pending_confirm: None,
            layout: ChatLayout::new(),
            user_list: UserListLayout::default(),
            unread: UnreadCounter::new(),
            notifier,
            autocomplete: Autocomplete::new(),
            hidden: false,
        }
    }

    /// Cap the number of users the view lists individually.
    pub fn with_max_user_list(mut self, max: usize) -> Self {
        self.user_list = UserListLayout::new(max);
        self
    }

    // -- accessors -----------------------------------------------------------

    pub fn logged_in(&self) -> &str {
        &self.logged_in
    }

    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn vote_state(&self) -> VoteState {
        self.vote
    }

    pub fn room(&self) -> &RoomController<A> {
        &self.room
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn notifier(&self) -> &DesktopNotifier {
        &self.notifier
    }

    pub fn unread(&self) -> &UnreadCounter {
        &self.unread
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn into_view(self) -> V {
        self.view
    }

    // -- participants --------------------------------------------------------

    fn class_of(&self, name: &str) -> UserClass {
        if name == self.logged_in {
            UserClass::SelfUser
        } else {
            UserClass::User
        }
    }

    /// Load the room's initial participant list.
    pub fn seed_participants(&mut self, users: impl IntoIterator<Item = User>) {
        for user in users {
            let class = self.class_of(&user.name);
            let user = user.with_class(class);
            if user.name == self.logged_in {
                self.vote.reconcile(user.vote, user.confirmed);
            }
            self.upsert_user(&user.name, user.attributes());
        }
        if self.vote.current().is_some() {
            self.view.set_active_vote(self.vote.current());
            self.view.set_vote_confirmed(self.vote.is_confirmed());
        }
    }

    /// Returns `true` when the participant list changed.
    fn upsert_user(&mut self, name: &str, attrs: Attributes) -> bool {
        let class = self.class_of(name);
        match self.participants.upsert(name, class, &attrs) {
            Ok(event) => {
                let changed = event.is_some();
                self.render_user(event);
                changed
            }
            Err(e) => {
                tracing::warn!(user = %name, error = %e, "ignoring invalid participant update");
                false
            }
        }
    }

    fn render_user(&mut self, event: Option<CollectionEvent>) {
        match event {
            Some(CollectionEvent::Add(user)) => match self.user_list.add(&user.name) {
                UserSlot::Shown => self.view.user_added(&user),
                UserSlot::Overflow { hidden } => self.view.user_overflow(hidden),
            },
            Some(CollectionEvent::Change(user)) => {
                if self.user_list.is_shown(&user.name) {
                    self.view.user_changed(&user);
                }
            }
            None => {}
        }
    }

    // -- messages ------------------------------------------------------------

    fn add_message(&mut self, message: Message) {
        let compact = self.layout.place(&message);
        self.view.add_message(&message, compact);
        if self.unread.on_message(self.hidden) {
            self.view.set_unread(self.unread.badge());
        }
        if let Some(notification) = self.notifier.on_message(&message, self.hidden) {
            self.view.notify(&notification);
        }
        self.messages.push(message);
    }

    /// Add a line attributed to the room itself.
    fn notice(&mut self, text: &str) {
        let text = ellipsize(text, Message::MAX_LENGTH - 1);
        match Message::system(&text) {
            Ok(message) => self.add_message(message),
            Err(e) => tracing::warn!(error = %e, "dropping unrenderable notice"),
        }
    }

    fn add_chat(&mut self, from: &str, body: &str) {
        let class = self.class_of(from);
        let built = match body.strip_prefix(ACTION_PREFIX) {
            Some(action) => Message::action(from, action, class),
            None => Message::chat(from, body, class),
        };
        match built {
            Ok(message) => self.add_message(message),
            Err(e) => tracing::warn!(from = %from, error = %e, "dropping invalid chat message"),
        }
    }

    // -- realtime ------------------------------------------------------------

    pub fn handle_realtime(&mut self, event: RealtimeEvent) {
        tracing::debug!(event = %event.name(), "realtime event");
        match event {
            RealtimeEvent::Connecting => self.notice(NOTICE_CONNECTING),
            RealtimeEvent::Connected => {
                tracing::info!(room_id = %self.room.room().room_id, "realtime connected");
                self.notice(NOTICE_CONNECTED);
            }
            RealtimeEvent::Disconnected => self.notice(NOTICE_DISCONNECTED),
            RealtimeEvent::Reconnecting { delay_secs } => {
                self.notice(&reconnecting_notice(delay_secs))
            }
            RealtimeEvent::Chat { from, body } => {
                self.upsert_user(&from, patch(json!({ "present": true })));
                self.add_chat(&from, &body);
            }
            RealtimeEvent::Vote { from, vote, confirmed } if from == self.logged_in => {
                self.vote.reconcile(vote, confirmed);
                if confirmed {
                    self.pending_confirm = None;
                }
                // The record follows the reconciled state, not the raw push.
                self.sync_self_record();
                self.view.set_active_vote(self.vote.current());
                self.view.set_vote_confirmed(self.vote.is_confirmed());
            }
            RealtimeEvent::Vote { from, vote, confirmed } => {
                self.upsert_user(
                    &from,
                    patch(json!({ "vote": vote, "confirmed": confirmed, "present": true })),
                );
            }
            RealtimeEvent::Join { user } => {
                if self.upsert_user(&user, patch(json!({ "present": true }))) {
                    self.notice(&format!("{user} has joined the room"));
                }
            }
            RealtimeEvent::Part { user } => {
                if self.upsert_user(&user, patch(json!({ "present": false }))) {
                    self.notice(&format!("{user} has left the room"));
                }
            }
            RealtimeEvent::PleaseVote => {
                self.view.show_vote_widget();
                let names: Vec<&str> = VOTE_TYPES.iter().map(VoteType::as_str).collect();
                self.notice(&format!(
                    "the polls are open! vote with /vote <{}>",
                    names.join("|")
                ));
            }
            RealtimeEvent::Merge { destination } => {
                self.notice(&format!("this room is merging into {destination}"))
            }
            RealtimeEvent::UsersAbandoned { users } => {
                self.notice(&format!("{} users abandoned the room", users.len()))
            }
            RealtimeEvent::Abandon => self.notice("the room has been abandoned"),
            RealtimeEvent::Continue { body } => match body {
                Some(name) => self.notice(&format!("the room continues at /r/{name}")),
                None => self.notice("the room continues!"),
            },
            RealtimeEvent::NoMatch => self.notice("no match was found for this room"),
            RealtimeEvent::UpdatedName { room_name } => {
                self.room.set_room_name(Some(room_name.clone()));
                self.view.room_renamed(&room_name);
                self.notice(&format!("room renamed to {room_name}"));
            }
            RealtimeEvent::Unknown { kind } => {
                tracing::debug!(kind = %kind, "ignoring unknown realtime event");
            }
        }
    }

    // -- ui ------------------------------------------------------------------

    pub fn handle_ui(&mut self, event: UiEvent) {
        match event {
            UiEvent::Submit(text) => self.submit(&text),
            UiEvent::VoteClicked(vote) => {
                // Clicking the already-active button does nothing.
                if self.vote == VoteState::Unconfirmed(vote) {
                    return;
                }
                self.vote_command(Some(vote));
            }
            UiEvent::ConfirmClicked => self.confirm_command(),
            UiEvent::VisibilityChanged { hidden } => self.set_hidden(hidden),
            UiEvent::NotificationsToggled(desired) => {
                if !self.notifier.toggle_enabled() {
                    self.notice(NOTICE_NOTIFICATIONS_BLOCKED);
                    return;
                }
                if self.notifier.set_desired(desired) {
                    tracing::info!("desktop notifications need permission from the host");
                }
            }
            UiEvent::PermissionResolved(permission) => {
                tracing::debug!(?permission, "notification permission resolved");
                self.notifier.set_permission(permission);
            }
        }
    }

    fn submit(&mut self, text: &str) {
        self.autocomplete.cancel();
        match parse_input(text) {
            Input::Empty => {}
            Input::Chat(text) => {
                self.view.input_disable();
                // Invalid text comes back through the room channel as `invalid:message`.
                let _ = self.room.spawn_message(&text);
            }
            Input::Command { name, args } => {
                self.view.input_clear();
                match Command::from_parts(&name, &args) {
                    Command::Vote(arg) => {
                        self.vote_command(arg.as_deref().and_then(VoteType::parse_submittable))
                    }
                    Command::Me(action) if action.is_empty() => self.notice(NOTICE_ME_USAGE),
                    Command::Me(action) => {
                        self.view.input_disable();
                        let _ = self.room.spawn_message(&format!("{ACTION_PREFIX}{action}"));
                    }
                    Command::Confirm => self.confirm_command(),
                    Command::Unknown(name) => self.notice(&unknown_command_notice(&name)),
                }
            }
        }
    }

    /// `None` means the requested vote type was not recognised.
    fn vote_command(&mut self, vote: Option<VoteType>) {
        if self.vote.is_confirmed() {
            self.notice(NOTICE_ALREADY_CONFIRMED);
            return;
        }
        let Some(vote) = vote else {
            self.notice(NOTICE_INVALID_VOTE);
            return;
        };
        if let Err(e) = self.vote.cast(vote) {
            tracing::error!(error = %e, "vote state out of sync with the view");
            return;
        }
        self.view.set_active_vote(Some(vote));
        self.sync_self_record();
        let _ = self.room.spawn_vote(vote, None);
    }

    fn confirm_command(&mut self) {
        match self.vote {
            VoteState::NotVoted => self.notice(NOTICE_NOT_VOTED),
            VoteState::Confirmed(_) => self.notice(NOTICE_VOTE_ALREADY_CONFIRMED),
            VoteState::Unconfirmed(_) => match self.vote.confirm() {
                Ok(vote) => {
                    self.pending_confirm = Some(vote);
                    self.view.set_vote_confirmed(true);
                    self.sync_self_record();
                    let _ = self.room.spawn_vote(vote, Some(true));
                }
                Err(e) => tracing::error!(error = %e, "vote state out of sync with the view"),
            },
        }
    }

    /// Mirror the vote state onto the logged-in user's record.
    fn sync_self_record(&mut self) {
        let vote = self.vote.current().unwrap_or(VoteType::NoVote);
        let confirmed = self.vote.is_confirmed();
        let logged_in = self.logged_in.clone();
        self.upsert_user(
            &logged_in,
            patch(json!({ "vote": vote, "confirmed": confirmed, "present": true })),
        );
    }

    /// A confirmation post failed: go back to the unconfirmed vote so the
    /// user can confirm again.
    fn rollback_confirm(&mut self, data: &Attributes) {
        let posted_confirm = data.get("confirmed").and_then(Value::as_bool) == Some(true);
        let posted_vote = data
            .get("vote")
            .and_then(Value::as_str)
            .and_then(VoteType::parse_submittable);
        let (true, Some(vote)) = (posted_confirm, posted_vote) else {
            return;
        };
        if self.pending_confirm != Some(vote) {
            return;
        }
        self.pending_confirm = None;
        match self.vote.unconfirm(vote) {
            Ok(()) => {
                tracing::info!(vote = %vote, "confirmation rejected, vote is unconfirmed again");
                self.view.set_vote_confirmed(false);
                self.sync_self_record();
            }
            Err(e) => tracing::debug!(error = %e, "vote moved on before the confirmation failed"),
        }
    }

    fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
        if self.unread.on_visibility(hidden) {
            self.view.set_unread(self.unread.badge());
        }
        if !hidden {
            let closed = self.notifier.clear();
            if !closed.is_empty() {
                self.view.close_notifications(&closed);
            }
        }
    }

    /// Feed a keystroke from the input box. Returns replacement input text.
    pub fn complete(&mut self, key: Key, text: &str) -> Option<String> {
        self.autocomplete.on_key(key, text, self.participants.names())
    }

    /// Close notifications that outlived their TTL.
    pub fn expire_notifications(&mut self, now: Instant) {
        let expired = self.notifier.expire(now);
        if !expired.is_empty() {
            self.view.close_notifications(&expired);
        }
    }

    // -- room ----------------------------------------------------------------

    pub fn handle_room(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Request { action } => {
                tracing::debug!(action = %action, "room request sent");
            }
            RoomEvent::Success { action: RoomAction::Message, .. } => self.view.input_clear(),
            RoomEvent::Success { action: RoomAction::Vote, data } => {
                tracing::debug!(vote = ?data.get("vote"), "vote accepted");
                if data.get("confirmed").and_then(Value::as_bool) == Some(true) {
                    self.pending_confirm = None;
                }
            }
            RoomEvent::Error { action, error, data } => {
                log_post_error(action, &error);
                match action {
                    RoomAction::Message => {
                        self.view.input_clear();
                        self.notice(NOTICE_POST_FAILED);
                    }
                    RoomAction::Vote => {
                        self.rollback_confirm(&data);
                        self.notice(NOTICE_VOTE_FAILED);
                    }
                }
            }
            RoomEvent::Invalid { action: RoomAction::Message, error } => {
                if error.kind == ValidationErrorKind::LengthOutOfRange {
                    self.notice(&format!(
                        "messages must be between 1 and {} characters",
                        Message::MAX_LENGTH
                    ));
                }
                self.view.input_enable();
            }
            RoomEvent::Invalid { action: RoomAction::Vote, .. } => {
                self.notice(NOTICE_INVALID_VOTE)
            }
        }
    }

    // -- loop ----------------------------------------------------------------

    /// Process events until the UI source closes, then hand back the view.
    pub async fn run(
        mut self,
        mut realtime: UnboundedReceiver<RealtimeEvent>,
        mut ui: UnboundedReceiver<UiEvent>,
        mut room: UnboundedReceiver<RoomEvent>,
    ) -> V {
        let mut sweep = tokio::time::interval(NOTIFICATION_SWEEP);
        loop {
            tokio::select! {
                Some(event) = realtime.recv() => self.handle_realtime(event),
                event = ui.recv() => match event {
                    Some(event) => self.handle_ui(event),
                    None => break,
                },
                Some(event) = room.recv() => self.handle_room(event),
                now = sweep.tick() => self.expire_notifications(now),
            }
        }
        tracing::info!(messages = self.messages.len(), "session ended");
        self.view
    }
}

fn log_post_error(action: RoomAction, error: &RobinError) {
    match error {
        RobinError::Application(errors) => {
            tracing::warn!(action = %action, errors = errors.len(), error = %error, "room action rejected")
        }
        // A local failure on the post path means the view and state disagree.
        local if local.is_local() => {
            tracing::error!(action = %action, error = %local, "room action failed before sending")
        }
        other => tracing::warn!(action = %action, error = %other, "room action failed"),
    }
}
