use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use robin_chat::api::HttpApi;
use robin_chat::cli::Args;
use robin_chat::config::RobinConfig;
use robin_chat::error::RobinError;
use robin_chat::events::UiEvent;
use robin_chat::join::JoinButton;
use robin_chat::models::{Room, User};
use robin_chat::notifications::{DesktopNotifier, Permission, PreferenceStore};
use robin_chat::realtime::{RealtimeClient, RealtimeConfig};
use robin_chat::room::RoomController;
use robin_chat::session::SessionController;
use robin_chat::terminal::TerminalView;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("robin_chat=info"));
    // stdout belongs to the chat view.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Map a line typed at the terminal to a UI intent.
///
/// A few client-only commands stand in for the browser's visibility and
/// notification toggles; everything else goes to the session as typed.
fn ui_event_for(line: String) -> UiEvent {
    match line.trim() {
        "/away" => UiEvent::VisibilityChanged { hidden: true },
        "/back" => UiEvent::VisibilityChanged { hidden: false },
        "/notifications on" => UiEvent::NotificationsToggled(true),
        "/notifications off" => UiEvent::NotificationsToggled(false),
        _ => UiEvent::Submit(line),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    if args.no_color {
        colored::control::set_override(false);
    }

    let mut config = RobinConfig::load(&args.config)?;
    args.apply(&mut config);

    let api = Arc::new(
        HttpApi::builder(config.base_url.clone())
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .request_timeout(Duration::from_secs(config.http.request_timeout_secs))
            .build(),
    );

    let room_id = if args.join {
        let mut button = JoinButton::new();
        button.unlock().await;
        eprintln!("waiting for a room assignment...");
        button
            .press(api.as_ref(), config.join.retries, config.join.interval())
            .await?
    } else {
        config
            .room_id
            .clone()
            .ok_or_else(|| RobinError::Config("no room id: pass --room or --join".into()))?
    };

    let (realtime_tx, realtime_rx) = mpsc::unbounded_channel();
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let (room_tx, room_rx) = mpsc::unbounded_channel();

    let room = RoomController::new(
        Room::new(room_id.clone(), config.room_name.clone()),
        Arc::clone(&api),
        room_tx,
    );

    // A terminal can always ring its bell.
    let notifier = DesktopNotifier::new(
        config.username.clone(),
        Permission::Granted,
        Some(PreferenceStore::new(&config.notifications.preferences_path)),
    )
    .with_ttl(Duration::from_secs(config.notifications.ttl_secs))
    .with_body_limit(config.notifications.body_limit);

    let mut session = SessionController::new(
        config.username.clone(),
        room,
        TerminalView::new(std::io::stdout()),
        notifier,
    )
    .with_max_user_list(config.view.max_user_list);
    // The room's other members arrive through join/chat/vote pushes.
    let mut me = User::new(config.username.clone());
    me.present = true;
    session.seed_participants([me]);

    let realtime = RealtimeClient::new(
        RealtimeConfig {
            url: config.resolved_websocket_url(&room_id),
            reconnect_delay: Duration::from_secs(config.realtime.reconnect_delay_secs),
            max_reconnects: config.realtime.max_reconnects,
        },
        realtime_tx,
    )
    .spawn();

    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if ui_tx.send(ui_event_for(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });

    tracing::info!(
        room_id = %room_id,
        user = %config.username,
        base_url = %api.base_url(),
        "session started"
    );
    session.run(realtime_rx, ui_rx, room_rx).await;
    realtime.abort();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_event_for_client_commands() {
        assert_eq!(
            ui_event_for("/away".into()),
            UiEvent::VisibilityChanged { hidden: true }
        );
        assert_eq!(
            ui_event_for(" /back ".into()),
            UiEvent::VisibilityChanged { hidden: false }
        );
        assert_eq!(
            ui_event_for("/notifications on".into()),
            UiEvent::NotificationsToggled(true)
        );
    }

    #[test]
    fn test_ui_event_for_passes_text_through() {
        assert_eq!(
            ui_event_for("/vote INCREASE".into()),
            UiEvent::Submit("/vote INCREASE".into())
        );
        assert_eq!(ui_event_for("hi all".into()), UiEvent::Submit("hi all".into()));
    }
}
