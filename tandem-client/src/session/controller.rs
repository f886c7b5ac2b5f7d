use crate::config::ClientConfig;
use crate::media::{LocalMedia, MediaSource};
use crate::negotiation::NegotiationEngine;
use crate::peer::{PeerEvent, PeerFactory, PeerState};
use crate::session::call_command::CallCommand;
use crate::session::reconnect::ReconnectSupervisor;
use crate::session::state_machine::{SessionEvent, SessionStateMachine};
use crate::transport::{Connection, Connector, SignalingTransport, TransportEvent};
use std::future::Future;
use std::sync::Arc;
use tandem_core::{ConnectionStatus, Error, Result, RoomId, RoomJoined, SignalMessage, UserId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Actor owning one client's call: the signaling transport, the peer
/// connection and the local media. Commands, transport events, peer
/// events and the reconnect timer are all handled on its task.
pub(crate) struct CallController {
    config: ClientConfig,
    user_id: UserId,
    connector: Arc<dyn Connector>,
    peers: Arc<dyn PeerFactory>,
    media_source: Arc<dyn MediaSource>,
    machine: SessionStateMachine,
    status_tx: watch::Sender<ConnectionStatus>,
    command_rx: mpsc::Receiver<CallCommand>,
    transport: Option<Box<dyn SignalingTransport>>,
    transport_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    engine: Option<NegotiationEngine>,
    peer_rx: Option<mpsc::UnboundedReceiver<PeerEvent>>,
    media: Option<LocalMedia>,
    room_id: Option<RoomId>,
    /// Set once the server confirmed the join on the current transport.
    joined: bool,
    reconnect: ReconnectSupervisor,
}

async fn recv_opt<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl CallController {
    pub(crate) fn new(
        config: ClientConfig,
        user_id: UserId,
        connector: Arc<dyn Connector>,
        peers: Arc<dyn PeerFactory>,
        media_source: Arc<dyn MediaSource>,
        status_tx: watch::Sender<ConnectionStatus>,
        command_rx: mpsc::Receiver<CallCommand>,
    ) -> Self {
        let reconnect = ReconnectSupervisor::new(config.reconnect.clone());
        Self {
            config,
            user_id,
            connector,
            peers,
            media_source,
            machine: SessionStateMachine::new(),
            status_tx,
            command_rx,
            transport: None,
            transport_rx: None,
            engine: None,
            peer_rx: None,
            media: None,
            room_id: None,
            joined: false,
            reconnect,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Call controller for {} started", self.user_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(event) = recv_opt(&mut self.transport_rx) => {
                    self.handle_transport_event(event).await;
                }
                Some(event) = recv_opt(&mut self.peer_rx) => {
                    self.handle_peer_event(event).await;
                }
                _ = self.reconnect.wait() => self.reconnect_now().await,
            }
        }

        self.teardown().await;
        info!("Call controller for {} finished", self.user_id);
    }

    fn transition(&mut self, event: SessionEvent) {
        if let Some(status) = self.machine.apply(event) {
            info!("Call status: {}", status);
            self.status_tx.send_replace(status);
        }
    }

    fn in_call(&self) -> bool {
        self.room_id.is_some()
    }

    async fn handle_command(&mut self, cmd: CallCommand) {
        match cmd {
            CallCommand::Start { room_id, reply } => {
                let result = self.start(room_id).await;
                let _ = reply.send(result);
            }
            CallCommand::HangUp { reply } => {
                self.hang_up().await;
                let _ = reply.send(());
            }
        }
    }

    /// Awaits `fut` while still answering commands. Returns `None` when
    /// a hangup arrived first, in which case the call is already torn
    /// down.
    async fn serving<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);

        loop {
            tokio::select! {
                out = &mut fut => return Some(out),
                cmd = self.command_rx.recv() => match cmd {
                    Some(CallCommand::HangUp { reply }) => {
                        self.hang_up().await;
                        let _ = reply.send(());
                        return None;
                    }
                    Some(CallCommand::Start { reply, .. }) => {
                        let _ = reply.send(Err(Error::CallInProgress));
                    }
                    None => {
                        self.hang_up().await;
                        return None;
                    }
                },
            }
        }
    }

    async fn start(&mut self, room_id: RoomId) -> Result<()> {
        if self.in_call() {
            return Err(Error::CallInProgress);
        }
        info!("{} starting call in room {}", self.user_id, room_id);
        self.reconnect.reset();
        self.transition(SessionEvent::StartCall);

        let media_source = self.media_source.clone();
        let connector = self.connector.clone();
        let constraints = self.config.media;
        let user_id = self.user_id.clone();
        let setup = async move {
            let media = media_source.acquire(&constraints).await?;
            match connector.connect(&user_id).await {
                Ok(connection) => Ok((media, connection)),
                Err(e) => {
                    media.stop();
                    Err(e)
                }
            }
        };

        let (media, connection) = match self.serving(setup).await {
            Some(Ok(prepared)) => prepared,
            Some(Err(e)) => {
                error!("Call setup failed: {}", e);
                let event = match e {
                    Error::MediaAccess(_) => SessionEvent::MediaFailed,
                    _ => SessionEvent::ConnectFailed,
                };
                self.end(event).await;
                return Err(e);
            }
            None => return Err(Error::connection("call was hung up while connecting")),
        };

        self.media = Some(media);
        self.room_id = Some(room_id.clone());
        self.install(connection);

        if let Err(e) = self.replace_engine().await {
            error!("Failed to set up the peer connection: {}", e);
            self.end(SessionEvent::NegotiationFailed).await;
            return Err(e);
        }

        self.join_room(room_id)
    }

    fn install(&mut self, connection: Connection) {
        self.transport = Some(connection.transport);
        self.transport_rx = Some(connection.events);
        self.joined = false;
    }

    fn join_room(&mut self, room_id: RoomId) -> Result<()> {
        let Some(transport) = self.transport.as_deref() else {
            return Err(Error::NotConnected);
        };
        transport.send(&SignalMessage::JoinRoom { room_id })?;
        Ok(())
    }

    /// Closes the current peer connection, if any, and builds a fresh one
    /// with the local media attached.
    async fn replace_engine(&mut self) -> Result<()> {
        if let Some(mut old) = self.engine.take() {
            debug!("Replacing peer connection");
            old.close().await;
        }
        self.peer_rx = None;

        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let peer = self.peers.create(&self.config.ice_servers, peer_tx).await?;
        let mut engine = NegotiationEngine::new(peer);
        if let Some(media) = &self.media {
            engine.attach_local_media(media).await?;
        }

        self.engine = Some(engine);
        self.peer_rx = Some(peer_rx);
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(msg) => self.handle_signal(msg).await,
            TransportEvent::Closed {
                clean,
                code,
                reason,
            } => {
                self.transport = None;
                self.transport_rx = None;
                self.joined = false;
                if !self.in_call() {
                    return;
                }

                if clean {
                    info!("Signaling closed cleanly ({:?} {})", code, reason);
                    self.end(SessionEvent::TransportClosedClean).await;
                } else {
                    warn!("Signaling lost ({:?} {})", code, reason);
                    self.transition(SessionEvent::TransportLost);
                    self.schedule_reconnect().await;
                }
            }
        }
    }

    async fn schedule_reconnect(&mut self) {
        if self.reconnect.schedule().is_none() {
            self.end(SessionEvent::ReconnectExhausted).await;
        }
    }

    async fn reconnect_now(&mut self) {
        let Some(room_id) = self.room_id.clone() else {
            return;
        };
        let connector = self.connector.clone();
        let user_id = self.user_id.clone();

        let result = match self
            .serving(async move { connector.connect(&user_id).await })
            .await
        {
            Some(result) => result,
            None => return,
        };

        match result {
            Ok(connection) => {
                info!("Signaling reconnected, rejoining {}", room_id);
                self.install(connection);
                if let Err(e) = self.join_room(room_id) {
                    warn!("Rejoin failed: {}", e);
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!("Reconnect attempt {} failed: {}", self.reconnect.attempt(), e);
                self.schedule_reconnect().await;
            }
            Err(e) => {
                error!("Reconnect abandoned: {}", e);
                self.end(SessionEvent::ConnectFailed).await;
            }
        }
    }

    async fn handle_signal(&mut self, msg: SignalMessage) {
        if !self.in_call() {
            debug!("Ignoring {} outside a call", msg.kind());
            return;
        }

        match msg {
            SignalMessage::RoomJoined(joined) => self.on_room_joined(joined).await,

            SignalMessage::Offer { from, offer } => {
                debug!("Offer from {:?}", from);
                let (Some(engine), Some(transport)) =
                    (self.engine.as_mut(), self.transport.as_deref())
                else {
                    return;
                };
                match engine.handle_remote_offer(offer, transport).await {
                    Ok(true) => self.transition(SessionEvent::RemoteOffer),
                    Ok(false) => {}
                    Err(e) => {
                        error!("Failed to answer offer: {}", e);
                        self.end(SessionEvent::NegotiationFailed).await;
                    }
                }
            }

            SignalMessage::Answer { answer, .. } => {
                let Some(engine) = self.engine.as_mut() else {
                    return;
                };
                match engine.handle_remote_answer(answer).await {
                    Ok(_) => {}
                    Err(Error::Protocol(e)) => warn!("Dropping answer: {}", e),
                    Err(e) => {
                        error!("Failed to apply answer: {}", e);
                        self.end(SessionEvent::NegotiationFailed).await;
                    }
                }
            }

            SignalMessage::IceCandidate { candidate, .. } => {
                let Some(engine) = self.engine.as_mut() else {
                    return;
                };
                if let Err(e) = engine.handle_remote_ice_candidate(candidate).await {
                    warn!("Failed to add remote ICE candidate: {}", e);
                }
            }

            SignalMessage::UserJoined { user_id, .. } => {
                info!("{} joined the room", user_id);
            }

            SignalMessage::UserLeft { user_id, message } => {
                info!("{}: {}", user_id, message);
                self.transition(SessionEvent::PeerLeft);
                if self.machine.status() == ConnectionStatus::DisconnectedPeerLeft {
                    self.teardown().await;
                    self.transition(SessionEvent::CallEnded);
                }
            }

            SignalMessage::Error { message } => {
                warn!("Server error: {}", message);
                if self.machine.status() == ConnectionStatus::ConnectingSignaling {
                    self.end(SessionEvent::JoinRejected).await;
                }
            }

            SignalMessage::RoomReset { message } | SignalMessage::RoomsReset { message } => {
                info!("Room reset by server: {}", message);
                self.end(SessionEvent::RoomReset).await;
            }

            other => warn!("Unexpected {} from server", other.kind()),
        }
    }

    async fn on_room_joined(&mut self, joined: RoomJoined) {
        if !joined.success {
            warn!(
                "Join rejected: {}",
                joined.message.as_deref().unwrap_or("no reason given")
            );
            self.end(SessionEvent::JoinRejected).await;
            return;
        }
        info!(
            "Joined {} ({} users, full: {})",
            joined.room_id, joined.user_count, joined.is_room_full
        );
        self.reconnect.reset();

        // a rejoin after a transport loss starts over on a new connection
        if self.engine.as_ref().is_some_and(|e| e.is_used()) {
            if let Err(e) = self.replace_engine().await {
                error!("Failed to rebuild the peer connection: {}", e);
                self.end(SessionEvent::NegotiationFailed).await;
                return;
            }
        }

        // candidates queued by a replaced connection were dropped with it
        self.joined = true;
        if let (Some(engine), Some(transport)) = (self.engine.as_mut(), self.transport.as_deref()) {
            let sent = engine.flush_local_candidates(transport);
            if sent > 0 {
                debug!("Flushed {} queued ICE candidates", sent);
            }
        }

        self.transition(SessionEvent::RoomJoined {
            full: joined.is_room_full,
        });
        if !joined.is_room_full {
            return;
        }

        let (Some(engine), Some(transport)) = (self.engine.as_mut(), self.transport.as_deref())
        else {
            return;
        };
        if let Err(e) = engine.create_offer(transport).await {
            error!("Failed to create offer: {}", e);
            self.end(SessionEvent::NegotiationFailed).await;
        }
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::IceCandidate(candidate) => {
                let transport = self.transport.as_deref().filter(|_| self.joined);
                if let Some(engine) = self.engine.as_mut() {
                    engine.handle_local_candidate(candidate, transport);
                }
            }
            PeerEvent::StateChanged(PeerState::Connected) => {
                self.transition(SessionEvent::PeerConnected);
            }
            PeerEvent::StateChanged(PeerState::Failed) => {
                error!("Peer connection failed");
                self.end(SessionEvent::PeerFailed).await;
            }
            PeerEvent::StateChanged(state) => debug!("Peer connection state: {:?}", state),
            PeerEvent::RemoteTrack { kind, id } => {
                info!("Receiving remote {} track {}", kind, id);
                self.transition(SessionEvent::RemoteTrack);
            }
        }
    }

    /// Tears the call down, then publishes `event`. Anyone seeing the
    /// resulting status finds the call already released.
    async fn end(&mut self, event: SessionEvent) {
        self.teardown().await;
        self.transition(event);
    }

    async fn hang_up(&mut self) {
        info!("{} hanging up", self.user_id);
        self.end(SessionEvent::Hangup).await;
    }

    /// Releases everything the call holds: timer, peer connection, local
    /// media, then the signaling channel. Each step runs even if an
    /// earlier one failed; a second call finds nothing left to release.
    async fn teardown(&mut self) {
        if self.reconnect.is_pending() {
            info!("Cancelling reconnect attempt {}", self.reconnect.attempt());
        }
        self.reconnect.reset();

        if let Some(mut engine) = self.engine.take() {
            engine.close().await;
        }
        self.peer_rx = None;

        if let Some(media) = self.media.take() {
            media.stop();
        }

        if let Some(transport) = self.transport.take() {
            if transport.is_open()
                && let Err(e) = transport.send(&SignalMessage::LeaveRoom)
            {
                debug!("Could not send leave-room: {}", e);
            }
            transport.close();
        }
        self.transport_rx = None;
        self.joined = false;
        self.room_id = None;
    }
}
