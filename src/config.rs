//! Client configuration loaded from a TOML file.
//!
//! ```toml
//! base_url = "http://127.0.0.1:8080"
//! websocket_url = "ws://127.0.0.1:8080/robin/abc123"
//! room_id = "abc123"
//! username = "robin_fan"
//!
//! [join]
//! retries = 10
//! interval_ms = 1000
//!
//! [realtime]
//! reconnect_delay_secs = 5
//! max_reconnects = 5
//! ```
//!
//! Every key is optional. Command-line flags override file values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RobinError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 3,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinSettings {
    pub retries: u32,
    pub interval_ms: u64,
}

impl Default for JoinSettings {
    fn default() -> Self {
        Self {
            retries: 10,
            interval_ms: 1000,
        }
    }
}

impl JoinSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub reconnect_delay_secs: u64,
    pub max_reconnects: u32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: 5,
            max_reconnects: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub preferences_path: String,
    pub ttl_secs: u64,
    pub body_limit: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            preferences_path: "robin-prefs.toml".to_string(),
            ttl_secs: 10,
            body_limit: 160,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub max_user_list: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self { max_user_list: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobinConfig {
    pub base_url: String,
    pub websocket_url: Option<String>,
    pub room_id: Option<String>,
    pub room_name: Option<String>,
    pub username: String,
    pub http: HttpSettings,
    pub join: JoinSettings,
    pub realtime: RealtimeSettings,
    pub notifications: NotificationSettings,
    pub view: ViewSettings,
}

impl Default for RobinConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            websocket_url: None,
            room_id: None,
            room_name: None,
            username: "anonymous".to_string(),
            http: HttpSettings::default(),
            join: JoinSettings::default(),
            realtime: RealtimeSettings::default(),
            notifications: NotificationSettings::default(),
            view: ViewSettings::default(),
        }
    }
}

impl RobinConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RobinError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            RobinError::Config(msg) => RobinError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, RobinError> {
        toml::from_str(content).map_err(|e| RobinError::Config(e.to_string()))
    }

    /// The realtime URL, derived from the base URL and room when not set.
    pub fn resolved_websocket_url(&self, room_id: &str) -> String {
        if let Some(url) = &self.websocket_url {
            return url.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{ws_base}/robin/{room_id}")
    }
}
