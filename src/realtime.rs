//! Websocket event source for the room's realtime channel.
//!
//! Connects with tokio-tungstenite, decodes each text frame into a
//! [`RealtimeEvent`] and forwards it to the session. Connection lifecycle is
//! reported on the same channel. Reconnection uses a fixed delay and a bounded
//! number of attempts.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::RobinError;
use crate::events::RealtimeEvent;

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    /// Reconnect attempts after the first connection before giving up.
    pub max_reconnects: u32,
}

impl RealtimeConfig {
    /// Defaults: 5 s between attempts, at most 5 reconnects.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnects: 5,
        }
    }
}

/// How a single connection ended.
enum Closed {
    /// The server closed or the stream failed; try again.
    Dropped,
    /// Nobody is listening any more.
    ReceiverGone,
}

pub struct RealtimeClient {
    config: RealtimeConfig,
    events: UnboundedSender<RealtimeEvent>,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig, events: UnboundedSender<RealtimeEvent>) -> Self {
        Self { config, events }
    }

    pub fn spawn(self) -> JoinHandle<Result<(), RobinError>> {
        tokio::spawn(self.run())
    }

    fn emit(&self, event: RealtimeEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Connect, pump frames, and reconnect until the budget is spent.
    ///
    /// Returns `Ok(())` when the receiving side hangs up, or
    /// [`RobinError::Realtime`] after the last reconnect attempt fails.
    pub async fn run(self) -> Result<(), RobinError> {
        let mut reconnects: u32 = 0;
        loop {
            if !self.emit(RealtimeEvent::Connecting) {
                return Ok(());
            }

            match tokio_tungstenite::connect_async(self.config.url.as_str()).await {
                Ok((stream, _response)) => {
                    tracing::info!(url = %self.config.url, "realtime channel open");
                    reconnects = 0;
                    if !self.emit(RealtimeEvent::Connected) {
                        return Ok(());
                    }
                    if let Closed::ReceiverGone = self.pump(stream).await {
                        return Ok(());
                    }
                    if !self.emit(RealtimeEvent::Disconnected) {
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.config.url, error = %e, "realtime connect failed");
                }
            }

            if reconnects >= self.config.max_reconnects {
                tracing::error!(url = %self.config.url, reconnects, "giving up on realtime channel");
                return Err(RobinError::Realtime(format!(
                    "could not reach {} after {} reconnect attempts",
                    self.config.url, reconnects
                )));
            }
            reconnects += 1;

            let delay_secs = self.config.reconnect_delay.as_secs();
            if !self.emit(RealtimeEvent::Reconnecting { delay_secs }) {
                return Ok(());
            }
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn pump<S>(&self, mut stream: S) -> Closed
    where
        S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match RealtimeEvent::from_frame(&text) {
                    Ok(event) => {
                        if !self.emit(event) {
                            return Closed::ReceiverGone;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping undecodable realtime frame"),
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {} // binary / ping / pong
                Err(e) => {
                    tracing::warn!(error = %e, "realtime stream error");
                    break;
                }
            }
        }
        Closed::Dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    async fn drain(mut rx: mpsc::UnboundedReceiver<RealtimeEvent>) -> Vec<RealtimeEvent> {
        let mut out = Vec::new();
        while let Some(ev) = rx.recv().await {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_config_defaults() {
        let cfg = RealtimeConfig::new("ws://localhost/robin");
        assert_eq!(cfg.reconnect_delay, Duration::from_secs(5));
        assert_eq!(cfg.max_reconnects, 5);
    }

    #[tokio::test]
    async fn test_frames_are_forwarded_then_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(WsMessage::Text(
                r#"{"type":"chat","payload":{"from":"alice","body":"hi"}}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.send(WsMessage::Text("garbage".to_string())).await.unwrap();
            ws.send(WsMessage::Text(r#"{"type":"please_vote","payload":{}}"#.to_string()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let mut cfg = RealtimeConfig::new(format!("ws://{addr}/"));
        cfg.max_reconnects = 0;
        let result = RealtimeClient::new(cfg, tx).run().await;
        assert!(matches!(result, Err(RobinError::Realtime(_))));
        server.await.unwrap();

        let events = drain(rx).await;
        assert_eq!(
            events,
            vec![
                RealtimeEvent::Connecting,
                RealtimeEvent::Connected,
                RealtimeEvent::Chat { from: "alice".into(), body: "hi".into() },
                RealtimeEvent::PleaseVote,
                RealtimeEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_reconnects_then_gives_up() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cfg = RealtimeConfig {
            url: "ws://127.0.0.1:1/".to_string(),
            reconnect_delay: Duration::ZERO,
            max_reconnects: 2,
        };
        let result = RealtimeClient::new(cfg, tx).run().await;
        assert!(result.is_err());

        let events = drain(rx).await;
        assert_eq!(
            events,
            vec![
                RealtimeEvent::Connecting,
                RealtimeEvent::Reconnecting { delay_secs: 0 },
                RealtimeEvent::Connecting,
                RealtimeEvent::Reconnecting { delay_secs: 0 },
                RealtimeEvent::Connecting,
            ]
        );
    }

    #[tokio::test]
    async fn test_stops_quietly_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let cfg = RealtimeConfig::new("ws://127.0.0.1:1/");
        assert!(RealtimeClient::new(cfg, tx).run().await.is_ok());
    }
}
