use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::model::user::{UserId, validate_id};

/// Rooms are strictly one-to-one.
pub const ROOM_CAPACITY: usize = 2;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Serialize, Deserialize, Clone, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Random upper-case alphanumeric room code.
    pub fn generate(len: usize) -> Self {
        let mut code = String::with_capacity(len);
        while code.len() < len {
            for b in Uuid::new_v4().as_bytes() {
                if code.len() == len {
                    break;
                }
                let idx = *b as usize % ROOM_CODE_ALPHABET.len();
                code.push(ROOM_CODE_ALPHABET[idx] as char);
            }
        }
        Self(code)
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        validate_id("room id", s)?;
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for RoomId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Participants of one room, ordered by join time.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoomMembership {
    pub room_id: RoomId,
    participants: Vec<UserId>,
    capacity: usize,
}

impl RoomMembership {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            participants: Vec::with_capacity(ROOM_CAPACITY),
            capacity: ROOM_CAPACITY,
        }
    }

    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    pub fn user_count(&self) -> usize {
        self.participants.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.participants.contains(user_id)
    }

    /// Everyone except `user_id`, in join order.
    pub fn others(&self, user_id: &UserId) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|u| *u != user_id)
            .cloned()
            .collect()
    }

    pub fn admit(&mut self, user_id: UserId) -> Result<(), Error> {
        if self.is_full() {
            return Err(Error::Capacity(format!(
                "room {} is full (max {} participants)",
                self.room_id, self.capacity
            )));
        }
        if !self.contains(&user_id) {
            self.participants.push(user_id);
        }
        Ok(())
    }

    /// Returns false when the user was not a participant.
    pub fn remove(&mut self, user_id: &UserId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|u| u != user_id);
        before != self.participants.len()
    }

    pub fn clear(&mut self) -> Vec<UserId> {
        std::mem::take(&mut self.participants)
    }
}
