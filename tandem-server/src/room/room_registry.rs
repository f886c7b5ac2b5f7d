use crate::room::{JoinReply, Room, RoomCommand, RoomSnapshot};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tandem_core::{Error, RoomId, RoomJoined, SignalMessage, UserId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const ROOM_CHANNEL_CAPACITY: usize = 100;

#[derive(Clone)]
pub(crate) struct RoomHandle {
    pub(crate) tx: mpsc::Sender<RoomCommand>,
    pub(crate) generation: u64,
}

/// Why a user is leaving; only changes the notice the other side sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    Left,
    Disconnected,
}

impl LeaveReason {
    fn notice(self, user_id: &UserId) -> String {
        match self {
            Self::Left => format!("User {} left the room", user_id),
            Self::Disconnected => format!("User {} disconnected", user_id),
        }
    }
}

/// Maps room ids to their actors and users to the room they are in.
/// Rooms are created on first join and destroyed once empty.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    memberships: Arc<DashMap<UserId, RoomId>>,
    signaling: Arc<dyn SignalingOutput>,
    next_generation: Arc<AtomicU64>,
}

impl RoomRegistry {
    pub fn new(signaling: Arc<dyn SignalingOutput>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            memberships: Arc::new(DashMap::new()),
            signaling,
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn room_handle(&self, room_id: &RoomId) -> RoomHandle {
        if let Some(handle) = self.rooms.get(room_id) {
            return handle.clone();
        }

        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("Creating new room: {}", room_id);
                let (tx, rx) = mpsc::channel(ROOM_CHANNEL_CAPACITY);
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let room = Room::new(
                    room_id.clone(),
                    generation,
                    rx,
                    self.rooms.clone(),
                    self.signaling.clone(),
                );
                tokio::spawn(room.run());
                RoomHandle { tx, generation }
            })
            .clone()
    }

    fn forget_room(&self, room_id: &RoomId, generation: u64) {
        self.rooms
            .remove_if(room_id, |_, handle| handle.generation == generation);
    }

    pub fn room_of(&self, user_id: &UserId) -> Option<RoomId> {
        self.memberships.get(user_id).map(|r| r.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Puts `user_id` into `room_id`, leaving any other room first.
    /// The returned value is the `room-joined` reply for the joiner.
    pub async fn join(&self, user_id: &UserId, room_id: RoomId) -> RoomJoined {
        match self.room_of(user_id) {
            Some(current) if current == room_id => {
                return RoomJoined::rejected(room_id, "You are already in this room");
            }
            Some(_) => self.leave(user_id, LeaveReason::Left).await,
            None => {}
        }

        // recorded up front so a disconnect racing this join still finds
        // the room to leave
        self.memberships.insert(user_id.clone(), room_id.clone());

        loop {
            let handle = self.room_handle(&room_id);
            let (reply, reply_rx) = oneshot::channel();
            let cmd = RoomCommand::Join {
                user_id: user_id.clone(),
                reply,
            };

            if handle.tx.send(cmd).await.is_err() {
                debug!("Room {} closed under us, retrying", room_id);
                self.forget_room(&room_id, handle.generation);
                continue;
            }

            match reply_rx.await {
                Ok(JoinReply::Done(joined)) => {
                    if !joined.success {
                        self.memberships.remove_if(user_id, |_, r| *r == room_id);
                    }
                    return joined;
                }
                Ok(JoinReply::Closing) | Err(_) => {
                    self.forget_room(&room_id, handle.generation);
                }
            }
        }
    }

    /// No-op when the user is not in a room.
    pub async fn leave(&self, user_id: &UserId, reason: LeaveReason) {
        let Some((_, room_id)) = self.memberships.remove(user_id) else {
            debug!("{} left without being in a room", user_id);
            return;
        };

        let Some(handle) = self.rooms.get(&room_id).map(|h| h.clone()) else {
            return;
        };
        let cmd = RoomCommand::Leave {
            user_id: user_id.clone(),
            message: reason.notice(user_id),
        };
        if handle.tx.send(cmd).await.is_err() {
            warn!("Room {} died before {} could leave", room_id, user_id);
        }
    }

    /// Forwards an offer, answer or candidate to the sender's room peer.
    pub async fn relay(&self, from: &UserId, message: SignalMessage) -> Result<(), Error> {
        let Some(room_id) = self.room_of(from) else {
            return Err(Error::protocol("You have not joined a room"));
        };

        let handle = self.rooms.get(&room_id).map(|h| h.clone());
        let cmd = RoomCommand::Relay {
            from: from.clone(),
            message,
        };
        match handle {
            Some(handle) if handle.tx.send(cmd).await.is_ok() => Ok(()),
            _ => {
                self.memberships.remove_if(from, |_, r| *r == room_id);
                Err(Error::protocol("You have not joined a room"))
            }
        }
    }

    pub async fn rooms(&self) -> Vec<RoomSnapshot> {
        let handles: Vec<RoomHandle> = self.rooms.iter().map(|e| e.value().clone()).collect();

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            let (reply, reply_rx) = oneshot::channel();
            if handle.tx.send(RoomCommand::Snapshot { reply }).await.is_err() {
                continue;
            }
            if let Ok(snapshot) = reply_rx.await {
                if snapshot.user_count > 0 {
                    snapshots.push(snapshot);
                }
            }
        }
        snapshots.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        snapshots
    }

    async fn reset(&self, room_id: &RoomId, notify: bool) -> Option<Vec<UserId>> {
        let handle = self.rooms.get(room_id).map(|h| h.clone())?;

        let (reply, reply_rx) = oneshot::channel();
        let evicted = match handle.tx.send(RoomCommand::Reset { notify, reply }).await {
            Ok(()) => reply_rx.await.unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        self.forget_room(room_id, handle.generation);

        for user_id in &evicted {
            self.memberships.remove_if(user_id, |_, r| r == room_id);
        }
        Some(evicted)
    }

    /// Empties one room, sending `room-reset` to its members.
    /// Returns `false` for an unknown room.
    pub async fn reset_room(&self, room_id: &RoomId) -> bool {
        match self.reset(room_id, true).await {
            Some(evicted) => {
                info!("Room {} reset, {} users evicted", room_id, evicted.len());
                true
            }
            None => false,
        }
    }

    /// Empties every room and sends `rooms-reset` to every connected user.
    /// Returns how many rooms were cleared.
    pub async fn reset_all(&self) -> usize {
        let room_ids: Vec<RoomId> = self.rooms.iter().map(|e| e.key().clone()).collect();

        let mut cleared = 0;
        for room_id in &room_ids {
            if self.reset(room_id, false).await.is_some() {
                cleared += 1;
            }
        }
        self.memberships.clear();

        let notice = SignalMessage::RoomsReset {
            message: "All rooms have been reset".to_owned(),
        };
        for user_id in self.signaling.connected_users() {
            self.signaling.send_signal(&user_id, notice.clone()).await;
        }

        info!("All rooms reset ({} cleared)", cleared);
        cleared
    }
}
