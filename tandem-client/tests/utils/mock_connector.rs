use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tandem_client::transport::{Connection, Connector, SignalingTransport, TransportEvent};
use tandem_core::{Error, SignalMessage, UserId};
use tokio::sync::mpsc;

use super::call_helpers::{QUIET_PERIOD_MS, SIGNAL_TIMEOUT_MS};

struct LinkState {
    open: AtomicBool,
    closed_locally: AtomicBool,
}

/// Client half of a mock signaling channel.
struct MockTransport {
    state: Arc<LinkState>,
    outbound: mpsc::UnboundedSender<SignalMessage>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl SignalingTransport for MockTransport {
    fn send(&self, msg: &SignalMessage) -> tandem_core::Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        self.outbound
            .send(msg.clone())
            .map_err(|_| Error::NotConnected)
    }

    fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.state.closed_locally.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Closed {
            clean: true,
            code: Some(1000),
            reason: "leaving".to_owned(),
        });
    }
}

/// Server half of a mock signaling channel: sees what the client sent
/// and pushes messages or closures back.
pub struct ServerLink {
    pub user_id: UserId,
    state: Arc<LinkState>,
    outbound_rx: mpsc::UnboundedReceiver<SignalMessage>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerLink {
    /// Next message the client sent.
    pub async fn expect(&mut self) -> Result<SignalMessage> {
        tokio::time::timeout(
            Duration::from_millis(SIGNAL_TIMEOUT_MS),
            self.outbound_rx.recv(),
        )
        .await
        .context("Timeout waiting for a client message")?
        .context("Client transport dropped")
    }

    /// Skips client messages until one of the given wire type arrives.
    pub async fn expect_kind(&mut self, kind: &str) -> Result<SignalMessage> {
        loop {
            let msg = self.expect().await?;
            if msg.kind() == kind {
                return Ok(msg);
            }
            tracing::debug!("[ServerLink] skipping {} while waiting for {}", msg.kind(), kind);
        }
    }

    /// Fails if the client sends anything of the given wire type within
    /// the quiet period.
    pub async fn expect_none_of(&mut self, kind: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(QUIET_PERIOD_MS);
        loop {
            match tokio::time::timeout_at(deadline, self.outbound_rx.recv()).await {
                Err(_) | Ok(None) => return Ok(()),
                Ok(Some(msg)) if msg.kind() == kind => {
                    anyhow::bail!("unexpected {:?}", msg)
                }
                Ok(Some(_)) => continue,
            }
        }
    }

    pub fn push(&self, msg: SignalMessage) {
        let _ = self.events.send(TransportEvent::Message(msg));
    }

    /// Simulates the connection dropping without a close frame.
    pub fn drop_unclean(&self) {
        self.state.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Closed {
            clean: false,
            code: None,
            reason: "connection reset".to_owned(),
        });
    }

    /// Simulates the server closing with a normal close frame.
    pub fn close_clean(&self) {
        self.state.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Closed {
            clean: true,
            code: Some(1000),
            reason: "server shutdown".to_owned(),
        });
    }

    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn closed_locally(&self) -> bool {
        self.state.closed_locally.load(Ordering::SeqCst)
    }
}

/// Hands out [`ServerLink`]s for every connection the client opens.
pub struct MockConnector {
    links_tx: mpsc::UnboundedSender<ServerLink>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    refusing: AtomicBool,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerLink>) {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            links_tx,
            attempts: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            refusing: AtomicBool::new(false),
        });
        (connector, links_rx)
    }

    /// Makes the next `n` connects fail with a connection error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Makes every later connect fail with an error that retrying
    /// cannot fix.
    pub fn refuse_from_now(&self) {
        self.refusing.store(true, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, user_id: &UserId) -> tandem_core::Result<Connection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(Error::InvalidId(user_id.to_string()));
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::connection("connection refused"));
        }

        let state = Arc::new(LinkState {
            open: AtomicBool::new(true),
            closed_locally: AtomicBool::new(false),
        });
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let link = ServerLink {
            user_id: user_id.clone(),
            state: state.clone(),
            outbound_rx,
            events: events_tx.clone(),
        };
        let _ = self.links_tx.send(link);

        Ok(Connection {
            transport: Box::new(MockTransport {
                state,
                outbound,
                events: events_tx,
            }),
            events: events_rx,
        })
    }
}
