use crate::integration::init_tracing;
use crate::utils::{Received, TestClient, join, spawn_server};

#[tokio::test]
async fn test_duplicate_user_refused() {
    init_tracing();
    let (addr, _state) = spawn_server().await;

    let mut first = TestClient::connect(addr, "alice").await.unwrap();
    let mut second = TestClient::connect(addr, "alice").await.unwrap();

    let refusal = second.recv().await.unwrap();
    assert_eq!(refusal.kind(), "error");
    assert_eq!(second.next(2000).await.unwrap(), Received::Closed(Some(1008)));

    // the first connection is untouched
    let joined = join(&mut first, "R1").await.unwrap();
    assert!(joined.success);
}
