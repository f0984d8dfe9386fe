//! Desktop-notification policy and the persisted "notifications desired" preference.
//!
//! The notifier decides *whether* a chat line becomes a notification and
//! tracks the ones currently shown; the view is responsible for displaying
//! and closing them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::error::RobinError;
use crate::models::Message;

/// Storage key of the persisted preference.
pub const PREFERENCE_KEY: &str = "robin.notifications";

pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

pub const DEFAULT_BODY_LIMIT: usize = 160;

/// Cut `text` to `limit` characters, appending `…` when anything was dropped.
pub fn ellipsize(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// PreferenceStore
// ---------------------------------------------------------------------------

/// A TOML file holding the `robin.notifications` flag.
///
/// Other keys in the file are preserved on write.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<toml::Table, RobinError> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        content
            .parse::<toml::Table>()
            .map_err(|e| RobinError::Config(format!("{}: {e}", self.path.display())))
    }

    /// The stored preference. Unreadable or missing files count as "not desired".
    pub fn load(&self) -> bool {
        match self.read_table() {
            Ok(table) => table
                .get(PREFERENCE_KEY)
                .and_then(toml::Value::as_bool)
                .unwrap_or(false),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable preference file");
                false
            }
        }
    }

    pub fn save(&self, desired: bool) -> Result<(), RobinError> {
        let mut table = self.read_table().unwrap_or_default();
        table.insert(PREFERENCE_KEY.to_string(), toml::Value::Boolean(desired));
        let content =
            toml::to_string(&table).map_err(|e| RobinError::Config(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DesktopNotifier
// ---------------------------------------------------------------------------

/// Whether the host lets us show notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    /// Not asked yet.
    #[default]
    Default,
    Granted,
    Denied,
}

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    /// The author of the line that triggered it.
    pub title: String,
    pub body: String,
    pub shown_at: Instant,
}

#[derive(Debug)]
pub struct DesktopNotifier {
    logged_in: String,
    store: Option<PreferenceStore>,
    desired: bool,
    permission: Permission,
    ttl: Duration,
    body_limit: usize,
    shown: Vec<Notification>,
}

impl DesktopNotifier {
    /// The stored preference is honoured only if permission is already granted.
    pub fn new(
        logged_in: impl Into<String>,
        permission: Permission,
        store: Option<PreferenceStore>,
    ) -> Self {
        let desired = match (&store, permission) {
            (Some(store), Permission::Granted) => store.load(),
            _ => false,
        };
        Self {
            logged_in: logged_in.into(),
            store,
            desired,
            permission,
            ttl: DEFAULT_TTL,
            body_limit: DEFAULT_BODY_LIMIT,
            shown: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn desired(&self) -> bool {
        self.desired
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn set_permission(&mut self, permission: Permission) {
        self.permission = permission;
    }

    /// The toggle cannot be used once permission is denied.
    pub fn toggle_enabled(&self) -> bool {
        self.permission != Permission::Denied
    }

    /// Record the user's choice. Returns `true` when permission must be requested.
    pub fn set_desired(&mut self, desired: bool) -> bool {
        self.desired = desired;
        if let Some(store) = &self.store {
            if let Err(e) = store.save(desired) {
                tracing::warn!(error = %e, "failed to persist notification preference");
            }
        }
        desired && self.permission != Permission::Granted
    }

    pub fn should_notify(&self, hidden: bool) -> bool {
        self.desired && self.permission == Permission::Granted && hidden
    }

    /// Build a notification for `message` if it warrants one.
    ///
    /// Only lines that mention the logged-in user by name, and that they did
    /// not write themselves, notify.
    pub fn on_message(&mut self, message: &Message, hidden: bool) -> Option<Notification> {
        if !self.should_notify(hidden) {
            return None;
        }
        if message.author == self.logged_in || !message.message.contains(&self.logged_in) {
            return None;
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            title: message.author.clone(),
            body: ellipsize(&message.message, self.body_limit),
            shown_at: Instant::now(),
        };
        self.shown.push(notification.clone());
        Some(notification)
    }

    pub fn shown(&self) -> &[Notification] {
        &self.shown
    }

    /// Remove and return notifications older than the TTL.
    pub fn expire(&mut self, now: Instant) -> Vec<Notification> {
        let ttl = self.ttl;
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.shown)
            .into_iter()
            .partition(|n| now.saturating_duration_since(n.shown_at) >= ttl);
        self.shown = live;
        expired
    }

    /// Remove and return everything on screen.
    pub fn clear(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.shown)
    }
}
