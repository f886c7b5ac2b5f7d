use crate::media::LocalMedia;
use crate::peer::PeerConnection;
use crate::transport::SignalingTransport;
use tandem_core::{Error, IceCandidate, Result, SessionDescription, SignalMessage};
use tracing::{debug, info, warn};

/// Drives offer/answer/ICE for one peer connection.
///
/// Remote candidates that arrive before a remote description are held
/// and applied, once each, right after it is set. Local candidates
/// gathered while the signaling channel is down are queued until
/// [`NegotiationEngine::flush_local_candidates`].
pub struct NegotiationEngine {
    peer: Box<dyn PeerConnection>,
    local_tracks: usize,
    offer_sent: bool,
    answer_sent: bool,
    remote_description_set: bool,
    pending_remote_candidates: Vec<IceCandidate>,
    pending_local_candidates: Vec<IceCandidate>,
    closed: bool,
}

impl NegotiationEngine {
    pub fn new(peer: Box<dyn PeerConnection>) -> Self {
        Self {
            peer,
            local_tracks: 0,
            offer_sent: false,
            answer_sent: false,
            remote_description_set: false,
            pending_remote_candidates: Vec::new(),
            pending_local_candidates: Vec::new(),
            closed: false,
        }
    }

    pub async fn attach_local_media(&mut self, media: &LocalMedia) -> Result<()> {
        self.peer.attach_local_media(media).await?;
        self.local_tracks += media.tracks().len();
        Ok(())
    }

    /// True once an offer or answer has gone through this connection.
    pub fn is_used(&self) -> bool {
        self.offer_sent || self.answer_sent || self.remote_description_set
    }

    #[cfg(test)]
    fn pending_remote_candidates(&self) -> usize {
        self.pending_remote_candidates.len()
    }

    #[cfg(test)]
    fn pending_local_candidates(&self) -> usize {
        self.pending_local_candidates.len()
    }

    /// Creates, applies and sends the offer. A second call is a no-op, so
    /// at most one offer leaves per negotiation.
    pub async fn create_offer(&mut self, transport: &dyn SignalingTransport) -> Result<()> {
        if self.offer_sent {
            debug!("Offer already sent, not creating another");
            return Ok(());
        }
        if self.local_tracks == 0 {
            return Err(Error::negotiation("no local media tracks attached"));
        }

        let offer = self.peer.create_offer().await?;
        transport.send(&SignalMessage::Offer {
            from: None,
            offer,
        })?;
        self.offer_sent = true;
        info!("Offer sent");
        Ok(())
    }

    /// Applies a remote offer and answers it. Returns `false` when the
    /// offer was ignored as a duplicate or as glare.
    pub async fn handle_remote_offer(
        &mut self,
        offer: SessionDescription,
        transport: &dyn SignalingTransport,
    ) -> Result<bool> {
        if self.offer_sent {
            warn!("Ignoring remote offer: this side is the offerer");
            return Ok(false);
        }
        if self.remote_description_set {
            warn!("Ignoring duplicate remote offer");
            return Ok(false);
        }

        self.peer.set_remote_description(offer).await?;
        self.remote_description_set = true;
        self.replay_remote_candidates().await;

        let answer = self.peer.create_answer().await?;
        transport.send(&SignalMessage::Answer { from: None, answer })?;
        self.answer_sent = true;
        info!("Answer sent");
        Ok(true)
    }

    /// Applies the remote answer. An answer with no outstanding offer is a
    /// protocol error; a repeated one is ignored.
    pub async fn handle_remote_answer(&mut self, answer: SessionDescription) -> Result<bool> {
        if !self.offer_sent {
            return Err(Error::protocol("answer received without an outstanding offer"));
        }
        if self.remote_description_set {
            warn!("Ignoring duplicate remote answer");
            return Ok(false);
        }

        self.peer.set_remote_description(answer).await?;
        self.remote_description_set = true;
        self.replay_remote_candidates().await;
        Ok(true)
    }

    pub async fn handle_remote_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if !self.remote_description_set {
            debug!("Buffering remote ICE candidate until a remote description is set");
            self.pending_remote_candidates.push(candidate);
            return Ok(());
        }
        self.peer.add_ice_candidate(candidate).await
    }

    async fn replay_remote_candidates(&mut self) {
        let pending = std::mem::take(&mut self.pending_remote_candidates);
        if !pending.is_empty() {
            debug!("Applying {} buffered remote candidates", pending.len());
        }
        for candidate in pending {
            if let Err(e) = self.peer.add_ice_candidate(candidate).await {
                warn!("Failed to apply buffered ICE candidate: {}", e);
            }
        }
    }

    /// Sends a locally gathered candidate, or queues it while the channel
    /// is unavailable.
    pub fn handle_local_candidate(
        &mut self,
        candidate: IceCandidate,
        transport: Option<&dyn SignalingTransport>,
    ) {
        let Some(transport) = transport.filter(|t| t.is_open()) else {
            self.pending_local_candidates.push(candidate);
            return;
        };

        let msg = SignalMessage::IceCandidate {
            from: None,
            candidate,
        };
        if let Err(e) = transport.send(&msg) {
            debug!("Queueing local candidate: {}", e);
            if let SignalMessage::IceCandidate { candidate, .. } = msg {
                self.pending_local_candidates.push(candidate);
            }
        }
    }

    /// Sends queued local candidates in gathering order; stops at the first
    /// failure and keeps the rest. Returns how many went out.
    pub fn flush_local_candidates(&mut self, transport: &dyn SignalingTransport) -> usize {
        let pending = std::mem::take(&mut self.pending_local_candidates);
        let mut sent = 0;

        let mut rest = pending.into_iter();
        for candidate in rest.by_ref() {
            let msg = SignalMessage::IceCandidate {
                from: None,
                candidate,
            };
            if let Err(e) = transport.send(&msg) {
                debug!("Stopped flushing local candidates: {}", e);
                if let SignalMessage::IceCandidate { candidate, .. } = msg {
                    self.pending_local_candidates.push(candidate);
                }
                break;
            }
            sent += 1;
        }
        self.pending_local_candidates.extend(rest);

        if sent > 0 {
            debug!("Flushed {} queued local candidates", sent);
        }
        sent
    }

    /// Closes the peer connection. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending_remote_candidates.clear();
        if let Err(e) = self.peer.close().await {
            warn!("Peer connection close failed: {}", e);
        }
    }
}
