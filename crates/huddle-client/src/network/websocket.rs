use futures_util::{SinkExt, StreamExt};
use huddle_protocol::{ClientMessage, RelayMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::Result;

/// Frame queued for the relay writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ClientMessage),
    Close,
}

/// Sending half of the signaling channel to the meeting relay
///
/// Cloning is cheap; every clone feeds the same FIFO writer.
#[derive(Debug, Clone)]
pub struct SignalingClient {
    sender: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl SignalingClient {
    /// Connect to the relay and announce `username`
    ///
    /// Returns the client plus the inbound stream of relay messages in arrival
    /// order. The stream ends when the socket closes; it is never reopened.
    pub async fn connect(
        url: &str,
        username: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RelayMessage>)> {
        let (ws_stream, _) = connect_async(url).await?;
        tracing::info!("Connected to relay at {}", url);

        let (mut write, mut read) = ws_stream.split();

        let register = ClientMessage::RegisterUsername {
            username: username.to_string(),
        };
        write.send(Message::Text(register.to_json()?.into())).await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<RelayMessage>();
        let open = Arc::new(AtomicBool::new(true));

        // Outgoing frames
        let open_writer = open.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                match frame {
                    Outbound::Message(msg) => {
                        let json = match msg.to_json() {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize {}: {}", msg.kind(), e);
                                continue;
                            }
                        };

                        if write.send(Message::Text(json.into())).await.is_err() {
                            tracing::error!("Failed to send {} to relay", msg.kind());
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        let _ = write.close().await;
                        tracing::debug!("Relay socket closed locally");
                        break;
                    }
                }
            }
            open_writer.store(false, Ordering::SeqCst);
        });

        // Incoming frames
        let open_reader = open.clone();
        tokio::spawn(async move {
            while let Some(result) = read.next().await {
                match result {
                    Ok(Message::Text(text)) => match RelayMessage::from_json(&text) {
                        Ok(msg) => {
                            if inbound_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Ignoring malformed relay message: {}", e);
                        }
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("Relay closed the connection");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Relay socket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            open_reader.store(false, Ordering::SeqCst);
        });

        Ok((Self { sender: tx, open }, inbound_rx))
    }

    /// A client whose frames go to the returned receiver instead of a socket
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, rx) = mpsc::unbounded_channel();
        let client = Self {
            sender,
            open: Arc::new(AtomicBool::new(true)),
        };
        (client, rx)
    }

    /// Queue a message for the relay; dropped with a warning if the channel is not open
    pub fn send(&self, message: ClientMessage) {
        if !self.is_open() {
            tracing::warn!("Dropping {}: signaling channel is not open", message.kind());
            return;
        }

        tracing::debug!("Sending {} to relay", message.kind());
        if self.sender.send(Outbound::Message(message)).is_err() {
            tracing::warn!("Signaling writer has stopped");
            self.open.store(false, Ordering::SeqCst);
        }
    }

    /// Close the channel; later calls are no-ops
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.sender.send(Outbound::Close);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_after_close_is_dropped() {
        let (client, mut rx) = SignalingClient::channel();

        client.send(ClientMessage::ScreenShare { sharing: true });
        client.close();
        client.close();
        client.send(ClientMessage::ScreenShare { sharing: false });

        assert_eq!(
            rx.try_recv().unwrap(),
            Outbound::Message(ClientMessage::ScreenShare { sharing: true })
        );
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err());
        assert!(!client.is_open());
    }

    #[test]
    fn test_clones_share_open_state() {
        let (client, _rx) = SignalingClient::channel();
        let other = client.clone();
        other.close();
        assert!(!client.is_open());
    }
}
