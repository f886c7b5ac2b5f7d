use crate::integration::init_tracing;
use crate::utils::{RecordingMediaSource, TestCall, room, test_config};
use tandem_core::{ConnectionStatus, Error, RoomId, RoomJoined, SignalMessage};

#[tokio::test(start_paused = true)]
async fn test_denied_media_fails_before_connecting() {
    init_tracing();
    let call = TestCall::spawn_with("alice", test_config(), RecordingMediaSource::denied());

    let err = call.handle.start_call(room("R1")).await.unwrap_err();

    assert!(matches!(err, Error::MediaAccess(_)));
    assert_eq!(call.handle.status(), ConnectionStatus::Failed);
    assert_eq!(call.connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_server_fails_without_retry() {
    init_tracing();
    let call = TestCall::spawn("alice");
    call.connector.fail_next(1);

    let err = call.handle.start_call(room("R1")).await.unwrap_err();

    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(call.handle.status(), ConnectionStatus::Failed);
    assert!(call.media.last().unwrap().is_stopped());

    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert_eq!(call.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_refused() {
    init_tracing();
    let mut call = TestCall::spawn("alice");
    let (_link, _peer) = call.wait_alone_in("R1").await.unwrap();

    let err = call.handle.start_call(room("R2")).await.unwrap_err();

    assert_eq!(err, Error::CallInProgress);
    assert_eq!(call.handle.status(), ConnectionStatus::WaitingForPeer);
    assert_eq!(call.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_room_rejection_fails_the_call() {
    init_tracing();
    let mut call = TestCall::spawn("carol");
    let (mut link, peer) = call.start_in("R1").await.unwrap();

    link.push(SignalMessage::RoomJoined(RoomJoined::rejected(
        RoomId::parse("R1").unwrap(),
        "Room is full (max 2 participants)",
    )));
    call.wait_for(ConnectionStatus::Failed).await.unwrap();

    assert!(peer.is_closed());
    assert!(call.media.last().unwrap().is_stopped());
    link.expect_kind("leave-room").await.unwrap();
    assert!(link.closed_locally());
}

#[tokio::test(start_paused = true)]
async fn test_call_can_restart_after_failure() {
    init_tracing();
    let mut call = TestCall::spawn("carol");
    let (link, _peer) = call.start_in("R1").await.unwrap();
    link.push(SignalMessage::RoomJoined(RoomJoined::rejected(
        room("R1"),
        "Room is full (max 2 participants)",
    )));
    call.wait_for(ConnectionStatus::Failed).await.unwrap();

    let (_link, _peer) = call.wait_alone_in("R2").await.unwrap();
    assert_eq!(call.media.acquisitions(), 2);
}
