use crate::integration::init_tracing;
use crate::utils::{PeerCall, TestCall, candidate, joined, user};
use tandem_client::peer::{PeerEvent, PeerState};
use tandem_core::{ConnectionStatus, SdpType, SessionDescription, SignalMessage};

#[tokio::test(start_paused = true)]
async fn test_second_joiner_sends_exactly_one_offer() {
    init_tracing();
    let mut bob = TestCall::spawn("bob");

    let (mut link, peer) = bob.start_in("R1").await.unwrap();
    assert_eq!(bob.handle.status(), ConnectionStatus::ConnectingSignaling);

    link.push(joined("R1", &["alice"]));
    let offer = link.expect_kind("offer").await.unwrap();
    match offer {
        SignalMessage::Offer { from, offer } => {
            assert_eq!(from, None);
            assert_eq!(offer.kind, SdpType::Offer);
        }
        other => panic!("expected offer, got {:?}", other),
    }
    bob.wait_for(ConnectionStatus::Negotiating).await.unwrap();

    link.push(SignalMessage::Answer {
        from: Some(user("alice")),
        answer: SessionDescription::answer("v=0 alice"),
    });
    link.push(SignalMessage::IceCandidate {
        from: Some(user("alice")),
        candidate: candidate("alice-1"),
    });
    peer.wait_for_call(&PeerCall::AddIce("alice-1".into()))
        .await
        .unwrap();

    peer.emit(PeerEvent::StateChanged(PeerState::Connected));
    bob.wait_for(ConnectionStatus::Connected).await.unwrap();

    assert_eq!(
        peer.negotiation_calls(),
        vec![
            PeerCall::CreateOffer,
            PeerCall::SetRemote(SdpType::Answer),
            PeerCall::AddIce("alice-1".into()),
        ]
    );
    assert_eq!(peer.calls()[0], PeerCall::AttachMedia(2));
    link.expect_none_of("offer").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_local_candidates_are_sent_while_connected() {
    init_tracing();
    let mut bob = TestCall::spawn("bob");
    let (mut link, peer) = bob.start_in("R1").await.unwrap();
    link.push(joined("R1", &["alice"]));
    link.expect_kind("offer").await.unwrap();

    peer.emit(PeerEvent::IceCandidate(candidate("bob-1")));

    match link.expect_kind("ice-candidate").await.unwrap() {
        SignalMessage::IceCandidate { candidate, .. } => assert_eq!(candidate.candidate, "bob-1"),
        other => panic!("expected ice-candidate, got {:?}", other),
    }
}
