use tandem_core::{Result, RoomId};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum CallCommand {
    Start {
        room_id: RoomId,
        reply: oneshot::Sender<Result<()>>,
    },
    HangUp {
        reply: oneshot::Sender<()>,
    },
}
