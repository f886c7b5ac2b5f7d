use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tandem_client::media::LocalMedia;
use tandem_client::peer::{PeerConnection, PeerEvent, PeerFactory};
use tandem_core::{IceCandidate, IceServerConfig, SdpType, SessionDescription};
use tokio::sync::mpsc;

use super::call_helpers::SIGNAL_TIMEOUT_MS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCall {
    AttachMedia(usize),
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpType),
    AddIce(String),
    Close,
}

#[derive(Default)]
struct PeerLog {
    calls: Mutex<Vec<PeerCall>>,
    closed: AtomicBool,
}

/// Test-side view of one peer connection the client created.
#[derive(Clone)]
pub struct MockPeerHandle {
    log: Arc<PeerLog>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

impl MockPeerHandle {
    pub fn calls(&self) -> Vec<PeerCall> {
        self.log.calls.lock().unwrap().clone()
    }

    /// Calls other than media attachment, in order.
    pub fn negotiation_calls(&self) -> Vec<PeerCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, PeerCall::AttachMedia(_)))
            .collect()
    }

    pub fn count(&self, call: &PeerCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn is_closed(&self) -> bool {
        self.log.closed.load(Ordering::SeqCst)
    }

    /// Feeds an event to the client as if the peer connection raised it.
    pub fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    /// Polls until `call` has been recorded.
    pub async fn wait_for_call(&self, call: &PeerCall) -> Result<()> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(SIGNAL_TIMEOUT_MS);
        while self.count(call) == 0 {
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("{:?} never happened, saw {:?}", call, self.calls());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

struct MockPeer {
    log: Arc<PeerLog>,
}

impl MockPeer {
    fn record(&self, call: PeerCall) {
        self.log.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn attach_local_media(&self, media: &LocalMedia) -> tandem_core::Result<()> {
        self.record(PeerCall::AttachMedia(media.tracks().len()));
        Ok(())
    }

    async fn create_offer(&self) -> tandem_core::Result<SessionDescription> {
        self.record(PeerCall::CreateOffer);
        Ok(SessionDescription::offer("v=0 mock offer"))
    }

    async fn create_answer(&self) -> tandem_core::Result<SessionDescription> {
        self.record(PeerCall::CreateAnswer);
        Ok(SessionDescription::answer("v=0 mock answer"))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> tandem_core::Result<()> {
        self.record(PeerCall::SetRemote(desc.kind));
        Ok(())
    }

    /// Candidates named `malformed*` are recorded, then refused.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> tandem_core::Result<()> {
        let refused = candidate.candidate.starts_with("malformed");
        self.record(PeerCall::AddIce(candidate.candidate));
        if refused {
            return Err(tandem_core::Error::negotiation("unparseable candidate"));
        }
        Ok(())
    }

    async fn close(&self) -> tandem_core::Result<()> {
        self.record(PeerCall::Close);
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Creates recording peers and hands their handles to the test.
pub struct MockPeerFactory {
    peers_tx: mpsc::UnboundedSender<MockPeerHandle>,
}

impl MockPeerFactory {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeerHandle>) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        (Arc::new(Self { peers_tx }), peers_rx)
    }
}

#[async_trait]
impl PeerFactory for MockPeerFactory {
    async fn create(
        &self,
        _ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> tandem_core::Result<Box<dyn PeerConnection>> {
        let log = Arc::new(PeerLog::default());
        let _ = self.peers_tx.send(MockPeerHandle {
            log: log.clone(),
            events,
        });
        Ok(Box::new(MockPeer { log }))
    }
}
