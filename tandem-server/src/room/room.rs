use crate::room::room_command::{JoinReply, RoomCommand, RoomSnapshot};
use crate::room::room_registry::RoomHandle;
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tandem_core::{Error, RoomId, RoomJoined, RoomMembership, SignalMessage, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Single owner of one room's membership. Lives until the last
/// participant leaves or the room is reset.
pub struct Room {
    membership: RoomMembership,
    generation: u64,
    created_at: u64,
    command_rx: mpsc::Receiver<RoomCommand>,
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    signaling: Arc<dyn SignalingOutput>,
}

enum Flow {
    Continue,
    Close,
}

impl Room {
    pub(crate) fn new(
        room_id: RoomId,
        generation: u64,
        command_rx: mpsc::Receiver<RoomCommand>,
        rooms: Arc<DashMap<RoomId, RoomHandle>>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            membership: RoomMembership::new(room_id),
            generation,
            created_at,
            command_rx,
            rooms,
            signaling,
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.membership.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            if let Flow::Close = self.handle_command(cmd).await {
                break;
            }
        }

        self.shutdown();
        info!("Room {} event loop finished", self.membership.room_id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join { user_id, reply } => {
                let joined = self.join(user_id.clone());
                let admitted = joined.success;
                let _ = reply.send(JoinReply::Done(joined));

                if admitted {
                    let notice = SignalMessage::UserJoined {
                        message: format!("User {} joined the room", user_id),
                        user_id: user_id.clone(),
                    };
                    self.broadcast_except(&user_id, notice).await;
                }
                Flow::Continue
            }

            RoomCommand::Leave { user_id, message } => {
                if !self.membership.remove(&user_id) {
                    debug!("{} is not in room {}", user_id, self.membership.room_id);
                    return Flow::Continue;
                }
                info!(
                    "User {} left room {} ({} remaining)",
                    user_id,
                    self.membership.room_id,
                    self.membership.user_count()
                );

                let notice = SignalMessage::UserLeft {
                    user_id: user_id.clone(),
                    message,
                };
                self.broadcast_except(&user_id, notice).await;

                if self.membership.is_empty() {
                    Flow::Close
                } else {
                    Flow::Continue
                }
            }

            RoomCommand::Relay { from, message } => {
                if !self.membership.contains(&from) {
                    warn!(
                        "Dropping {} from {}: not a member of room {}",
                        message.kind(),
                        from,
                        self.membership.room_id
                    );
                    return Flow::Continue;
                }

                let targets = self.membership.others(&from);
                if targets.is_empty() {
                    debug!("No peer to receive {} from {}", message.kind(), from);
                }
                let message = message.with_sender(from);
                for target in targets {
                    if !self.signaling.send_signal(&target, message.clone()).await {
                        warn!("Failed to relay {} to {}", message.kind(), target);
                    }
                }
                Flow::Continue
            }

            RoomCommand::Reset { notify, reply } => {
                let evicted = self.membership.clear();
                info!(
                    "Resetting room {} ({} users)",
                    self.membership.room_id,
                    evicted.len()
                );

                if notify {
                    let notice = SignalMessage::RoomReset {
                        message: format!("Room {} has been reset", self.membership.room_id),
                    };
                    for user_id in &evicted {
                        self.signaling.send_signal(user_id, notice.clone()).await;
                    }
                }
                let _ = reply.send(evicted);
                Flow::Close
            }

            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                Flow::Continue
            }
        }
    }

    fn join(&mut self, user_id: UserId) -> RoomJoined {
        let room_id = self.membership.room_id.clone();

        if self.membership.contains(&user_id) {
            return RoomJoined::rejected(room_id, "You are already in this room");
        }

        if let Err(Error::Capacity(reason)) = self.membership.admit(user_id.clone()) {
            info!("Rejecting {}: {}", user_id, reason);
            return RoomJoined::rejected(
                room_id,
                format!("Room is full (max {} participants)", self.membership.capacity()),
            );
        }

        info!(
            "User {} joined room {} ({}/{})",
            user_id,
            room_id,
            self.membership.user_count(),
            self.membership.capacity()
        );

        RoomJoined {
            success: true,
            room_id,
            user_count: self.membership.user_count(),
            other_users: self.membership.others(&user_id),
            is_room_full: self.membership.is_full(),
            message: None,
        }
    }

    async fn broadcast_except(&self, skip: &UserId, message: SignalMessage) {
        for target in self.membership.others(skip) {
            if !self.signaling.send_signal(&target, message.clone()).await {
                warn!("Failed to deliver {} to {}", message.kind(), target);
            }
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.membership.room_id.clone(),
            users: self.membership.participants().to_vec(),
            user_count: self.membership.user_count(),
            created_at: self.created_at,
        }
    }

    /// Unregisters the room, then answers whatever is still queued so no
    /// caller waits on a dead actor.
    fn shutdown(&mut self) {
        let generation = self.generation;
        self.rooms
            .remove_if(&self.membership.room_id, |_, handle| handle.generation == generation);
        self.command_rx.close();

        while let Ok(cmd) = self.command_rx.try_recv() {
            match cmd {
                RoomCommand::Join { reply, .. } => {
                    let _ = reply.send(JoinReply::Closing);
                }
                RoomCommand::Reset { reply, .. } => {
                    let _ = reply.send(Vec::new());
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                RoomCommand::Leave { .. } | RoomCommand::Relay { .. } => {}
            }
        }
    }
}
