use crate::transport::{CLOSE_NORMAL, Connection, Connector, SignalingTransport, TransportEvent};
use anyhow::Context;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_core::utils::signaling_path;
use tandem_core::{Error, Result, SignalMessage, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, warn};

/// Opens WebSocket signaling channels at `{server_url}/ws/{user_id}`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    server_url: String,
}

impl WsConnector {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }

    pub fn endpoint(&self, user_id: &UserId) -> String {
        format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            signaling_path(user_id)
        )
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, user_id: &UserId) -> Result<Connection> {
        let url = self.endpoint(user_id);
        let (socket, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("failed to connect to {}", url))
            .map_err(|e| Error::connection(format!("{:#}", e)))?;
        info!("Signaling channel open: {}", url);

        let (transport, events) = WsTransport::spawn(socket);
        Ok(Connection {
            transport: Box::new(transport),
            events,
        })
    }
}

enum Outbound {
    Frame(String),
    Close,
}

struct Shared {
    open: AtomicBool,
    closed_locally: AtomicBool,
}

/// WebSocket channel driven by a reader and a writer task. Dropping it
/// stops the reader; the writer drains what was already queued.
pub struct WsTransport {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: JoinHandle<()>,
}

impl WsTransport {
    pub fn spawn<S>(socket: S) -> (Self, mpsc::UnboundedReceiver<TransportEvent>)
    where
        S: futures::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Send
            + Unpin
            + 'static,
    {
        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            open: AtomicBool::new(true),
            closed_locally: AtomicBool::new(false),
        });

        tokio::spawn(async move {
            while let Some(out) = outbound_rx.recv().await {
                let frame = match out {
                    Outbound::Frame(text) => Message::Text(text.into()),
                    Outbound::Close => Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "leaving".into(),
                    })),
                };
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = sink.send(frame).await {
                    debug!("Signaling write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn({
            let shared = shared.clone();

            async move {
                let mut close_code = None;
                let mut reason = String::new();

                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(text)) => match SignalMessage::decode(text.as_str()) {
                            Ok(msg) => {
                                debug!("Received {}", msg.kind());
                                if events_tx.send(TransportEvent::Message(msg)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed signaling frame: {}", e),
                        },
                        Ok(Message::Close(frame)) => {
                            if let Some(frame) = frame {
                                close_code = Some(u16::from(frame.code));
                                reason = frame.reason.as_str().to_owned();
                            }
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Signaling channel error: {}", e);
                            reason = e.to_string();
                            break;
                        }
                    }
                }

                shared.open.store(false, Ordering::SeqCst);
                let clean = shared.closed_locally.load(Ordering::SeqCst)
                    || close_code == Some(CLOSE_NORMAL);
                info!(
                    "Signaling channel closed (clean: {}, code: {:?})",
                    clean, close_code
                );
                let _ = events_tx.send(TransportEvent::Closed {
                    clean,
                    code: close_code,
                    reason,
                });
            }
        });

        (
            Self {
                shared,
                outbound,
                reader,
            },
            events_rx,
        )
    }
}

impl SignalingTransport for WsTransport {
    fn send(&self, msg: &SignalMessage) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        let text = msg.encode()?;
        self.outbound
            .send(Outbound::Frame(text))
            .map_err(|_| Error::NotConnected)
    }

    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.shared.closed_locally.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.open.store(false, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
