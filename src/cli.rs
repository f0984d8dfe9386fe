use crate::config::RobinConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "robin-chat")]
#[command(version)]
#[command(about = "Terminal client for Robin group chat rooms")]
pub struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "robin.toml")]
    pub config: String,

    /// Base URL of the Robin site
    #[arg(long)]
    pub base_url: Option<String>,

    /// Realtime websocket URL (derived from the base URL when omitted)
    #[arg(long)]
    pub ws_url: Option<String>,

    /// Room id to attach to
    #[arg(long)]
    pub room: Option<String>,

    /// Name to chat as
    #[arg(long)]
    pub user: Option<String>,

    /// Join the waiting list and wait for a room assignment first
    #[arg(long)]
    pub join: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Overlay explicit flags onto the file config.
    pub fn apply(&self, config: &mut RobinConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(url) = &self.ws_url {
            config.websocket_url = Some(url.clone());
        }
        if let Some(room) = &self.room {
            config.room_id = Some(room.clone());
        }
        if let Some(user) = &self.user {
            config.username = user.clone();
        }
    }
}
