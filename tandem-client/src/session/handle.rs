use crate::config::ClientConfig;
use crate::media::{MediaSource, StaticMediaSource};
use crate::peer::{PeerFactory, RtcPeerFactory};
use crate::session::call_command::CallCommand;
use crate::session::controller::CallController;
use crate::transport::{Connector, WsConnector};
use std::sync::Arc;
use tandem_core::{ConnectionStatus, Error, Result, RoomId, UserId};
use tokio::sync::{mpsc, oneshot, watch};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// The interface presentation code talks to. Cloning is cheap; the call
/// ends when the last handle is dropped.
#[derive(Clone)]
pub struct CallHandle {
    command_tx: mpsc::Sender<CallCommand>,
    status_rx: watch::Receiver<ConnectionStatus>,
    user_id: UserId,
}

impl CallHandle {
    /// Spawns the call controller on the current tokio runtime.
    pub fn spawn(
        config: ClientConfig,
        user_id: UserId,
        connector: Arc<dyn Connector>,
        peers: Arc<dyn PeerFactory>,
        media_source: Arc<dyn MediaSource>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        let controller = CallController::new(
            config,
            user_id.clone(),
            connector,
            peers,
            media_source,
            status_tx,
            command_rx,
        );
        tokio::spawn(controller.run());

        Self {
            command_tx,
            status_rx,
            user_id,
        }
    }

    /// WebSocket signaling, webrtc-rs peer connections and static tracks.
    pub fn with_defaults(config: ClientConfig, user_id: UserId) -> Self {
        let connector = Arc::new(WsConnector::new(config.server_url.clone()));
        Self::spawn(
            config,
            user_id,
            connector,
            Arc::new(RtcPeerFactory),
            Arc::new(StaticMediaSource),
        )
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Acquires media, opens signaling and joins `room_id`. Returns once
    /// `join-room` has been sent; progress after that is reported through
    /// [`CallHandle::subscribe`].
    pub async fn start_call(&self, room_id: RoomId) -> Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(CallCommand::Start { room_id, reply })
            .await
            .map_err(|_| Error::connection("call controller has stopped"))?;
        reply_rx
            .await
            .map_err(|_| Error::connection("call controller has stopped"))?
    }

    /// Ends the call. Calling it again, or with no call running, is fine.
    pub async fn hang_up(&self) {
        let (reply, reply_rx) = oneshot::channel();
        if self
            .command_tx
            .send(CallCommand::HangUp { reply })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }
}
