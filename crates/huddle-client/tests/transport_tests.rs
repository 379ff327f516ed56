use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use huddle::network::SignalingClient;
use huddle_protocol::{ClientMessage, RelayMessage};

async fn next_text<S>(stream: &mut S) -> String
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return text.to_string(),
            Some(Ok(_)) => continue,
            other => panic!("relay stream ended: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_registers_then_exchanges_messages_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = accept_async(tcp).await.unwrap();
        let (mut write, mut read) = ws.split();

        let register = next_text(&mut read).await;
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&register).unwrap(),
            serde_json::json!({"type": "register_username", "username": "Dana"})
        );

        let frames = [
            r#"{"type":"existing_participants","is_host":true,"host_id":"me","participants":[]}"#,
            r#"{"type":"chat","message":"#,
            r#"{"type":"mystery","x":1}"#,
            r#"{"type":"participant_joined","participant_id":"p1","username":"Anna","is_host":false,"participant_count":2}"#,
        ];
        for frame in frames {
            write.send(Message::Text(frame.into())).await.unwrap();
        }

        let chat = next_text(&mut read).await;
        let chat: serde_json::Value = serde_json::from_str(&chat).unwrap();
        assert_eq!(chat["type"], "chat");
        assert_eq!(chat["message"], "hello");

        write.send(Message::Close(None)).await.unwrap();
    });

    let url = format!("ws://{}/ws/standup/me", addr);
    let (client, mut inbound) = SignalingClient::connect(&url, "Dana").await.unwrap();
    assert!(client.is_open());

    let first = inbound.recv().await.unwrap();
    assert!(matches!(
        first,
        RelayMessage::ExistingParticipants { is_host: true, .. }
    ));
    // the malformed frame is skipped, the unknown kind is delivered as such
    assert_eq!(inbound.recv().await.unwrap(), RelayMessage::Unknown);
    match inbound.recv().await.unwrap() {
        RelayMessage::ParticipantJoined {
            participant_id,
            participant_count,
            ..
        } => {
            assert_eq!(participant_id, "p1");
            assert_eq!(participant_count, Some(2));
        }
        other => panic!("unexpected {:?}", other),
    }

    client.send(ClientMessage::Chat {
        username: "Dana".into(),
        message: "hello".into(),
        timestamp: "2024-05-01T10:00:00Z".into(),
    });

    // the relay closing ends the inbound stream and marks the channel closed
    assert!(inbound.recv().await.is_none());
    relay.await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!client.is_open());

    client.send(ClientMessage::ScreenShare { sharing: true });
}

#[tokio::test]
async fn test_connect_to_missing_relay_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("ws://{}/ws/standup/me", addr);
    let result = SignalingClient::connect(&url, "Dana").await;
    assert!(matches!(result, Err(huddle::ClientError::Transport(_))));
}

#[tokio::test]
async fn test_local_close_reaches_relay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let relay = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let _register = next_text(&mut ws).await;
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    });

    let url = format!("ws://{}/ws/standup/me", addr);
    let (client, _inbound) = SignalingClient::connect(&url, "Dana").await.unwrap();
    client.close();
    client.close();
    assert!(!client.is_open());

    tokio::time::timeout(Duration::from_secs(5), relay)
        .await
        .unwrap()
        .unwrap();
}
