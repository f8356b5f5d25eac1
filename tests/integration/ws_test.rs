//! WebSocket end to end: handshake, commands, pushed events

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;
use xfhub::backend::auth::verifier::{CLOSE_TOKEN_EXPIRED, CLOSE_TOKEN_INVALID};

use xfhub::backend::store::MemoryStore;

use crate::common::{
    expired_token_for, start_test_server, start_test_server_with, test_config_builder, token_for,
    TestServer,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect and wait until the hub has registered the connection
async fn open(server: &TestServer, user: Uuid, name: &str) -> Socket {
    let (mut socket, _) = connect_async(server.ws_url(&token_for(user, name)))
        .await
        .expect("WebSocket handshake failed");
    send_json(&mut socket, serde_json::json!({"request_id": "sync", "type": "get_unread"})).await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["request_id"], "sync");
    socket
}

async fn send_json(socket: &mut Socket, frame: serde_json::Value) {
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Next JSON event, skipping control frames
async fn next_json(socket: &mut Socket) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).expect("Server sent invalid JSON")
                }
                Some(Ok(Message::Close(frame))) => panic!("Connection closed: {:?}", frame),
                Some(Ok(_)) => continue,
                other => panic!("Socket ended: {:?}", other),
            }
        }
    })
    .await
    .expect("Timed out waiting for an event")
}

/// Next event of a given type
async fn next_event(socket: &mut Socket, event_type: &str) -> serde_json::Value {
    loop {
        let event = next_json(socket).await;
        if event["event_type"] == event_type {
            return event;
        }
    }
}

/// Close code of the first close frame the server sends
async fn close_code(socket: &mut Socket) -> u16 {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
                Some(Ok(_)) => continue,
                other => panic!("Expected a close frame, got {:?}", other),
            }
        }
    })
    .await
    .expect("Timed out waiting for close")
}

#[tokio::test]
async fn test_invalid_token_is_closed_with_4002() {
    let server = start_test_server().await;
    let (mut socket, _) = connect_async(server.ws_url("garbage")).await.unwrap();
    assert_eq!(close_code(&mut socket).await, CLOSE_TOKEN_INVALID);
}

#[tokio::test]
async fn test_expired_token_is_closed_with_4001() {
    let server = start_test_server().await;
    let token = expired_token_for(Uuid::new_v4());
    let (mut socket, _) = connect_async(server.ws_url(&token)).await.unwrap();
    assert_eq!(close_code(&mut socket).await, CLOSE_TOKEN_EXPIRED);
}

#[tokio::test]
async fn test_commands_are_acked_with_request_id() {
    let server = start_test_server().await;
    let mut socket = open(&server, Uuid::new_v4(), "ada").await;

    send_json(
        &mut socket,
        serde_json::json!({"request_id": "r1", "type": "join_room", "room": "conversation:77"}),
    )
    .await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["event_type"], "ack");
    assert_eq!(ack["request_id"], "r1");
    assert_eq!(ack["payload"]["room"], "conversation:77");

    send_json(&mut socket, serde_json::json!({"request_id": "r2", "type": "get_unread"})).await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["request_id"], "r2");
    assert_eq!(ack["payload"]["pending_requests"], 0);
}

#[tokio::test]
async fn test_failed_command_keeps_connection_open() {
    let server = start_test_server().await;
    let mut socket = open(&server, Uuid::new_v4(), "ada").await;

    send_json(
        &mut socket,
        serde_json::json!({"request_id": "bad", "type": "join_room", "room": "lobby"}),
    )
    .await;
    let error = next_json(&mut socket).await;
    assert_eq!(error["event_type"], "error");
    assert_eq!(error["request_id"], "bad");
    assert_eq!(error["payload"]["code"], "invalid_room");
    assert_eq!(error["payload"]["retryable"], false);

    socket.send(Message::Text("{not json".into())).await.unwrap();
    let error = next_json(&mut socket).await;
    assert_eq!(error["payload"]["code"], "malformed_frame");

    send_json(&mut socket, serde_json::json!({"request_id": "ok", "type": "list_friends"})).await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["event_type"], "ack");
    assert_eq!(ack["payload"]["friends"], serde_json::json!([]));
}

#[tokio::test]
async fn test_typing_reaches_other_members() {
    let server = start_test_server().await;
    let ada_id = Uuid::new_v4();
    let mut ada = open(&server, ada_id, "ada").await;
    let mut bob = open(&server, Uuid::new_v4(), "bob").await;

    for socket in [&mut ada, &mut bob] {
        send_json(
            socket,
            serde_json::json!({"type": "join_room", "room": "conversation:12"}),
        )
        .await;
        next_event(socket, "ack").await;
    }

    send_json(
        &mut ada,
        serde_json::json!({"type": "typing", "room": "conversation:12", "is_typing": true}),
    )
    .await;

    let typing = next_event(&mut bob, "typing").await;
    assert_eq!(typing["room"], "conversation:12");
    assert_eq!(typing["payload"]["user_id"], ada_id.to_string());
    assert_eq!(typing["payload"]["display_name"], "ada");
    assert_eq!(typing["payload"]["is_typing"], true);
}

#[tokio::test]
async fn test_friend_request_pushes_to_every_device() {
    let server = start_test_server().await;
    let (ada_id, bob_id) = (Uuid::new_v4(), Uuid::new_v4());
    let mut ada = open(&server, ada_id, "ada").await;
    let mut bob_phone = open(&server, bob_id, "bob").await;
    let mut bob_laptop = open(&server, bob_id, "bob").await;

    send_json(
        &mut ada,
        serde_json::json!({"request_id": "f1", "type": "send_request", "user_id": bob_id}),
    )
    .await;
    let ack = next_event(&mut ada, "ack").await;
    assert_eq!(ack["payload"]["outcome"], "created");
    assert_eq!(ack["payload"]["state"], "outgoing");

    for socket in [&mut bob_phone, &mut bob_laptop] {
        let change = next_event(socket, "relationship_changed").await;
        assert_eq!(change["payload"]["user_id"], ada_id.to_string());
        assert_eq!(change["payload"]["state"], "incoming");
    }

    send_json(
        &mut bob_laptop,
        serde_json::json!({"request_id": "f2", "type": "accept_request", "user_id": ada_id}),
    )
    .await;
    let ack = next_event(&mut bob_laptop, "ack").await;
    assert_eq!(ack["payload"]["state"], "friends");

    let change = next_event(&mut ada, "relationship_changed").await;
    assert_eq!(change["payload"]["state"], "friends");
}

#[tokio::test]
async fn test_closing_socket_releases_viewer() {
    let server = start_test_server().await;
    server.store.start_session("live-ws").await;
    let mut socket = open(&server, Uuid::new_v4(), "ada").await;

    send_json(
        &mut socket,
        serde_json::json!({"request_id": "v1", "type": "join_viewer", "session_id": "live-ws"}),
    )
    .await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["payload"]["viewers"], 1);

    socket.close(None).await.unwrap();

    let released = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if server.store.session_snapshot("live-ws").await.unwrap().viewers == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "viewer was not released after close");
}

#[tokio::test]
async fn test_slow_commands_do_not_starve_heartbeat() {
    let config = test_config_builder()
        .heartbeat(Duration::from_millis(200), Duration::from_millis(300))
        .connection_grace(Duration::from_secs(20))
        .build()
        .unwrap();
    let server =
        start_test_server_with(config, MemoryStore::with_latency(Duration::from_millis(250))).await;
    let mut socket = open(&server, Uuid::new_v4(), "ada").await;

    for i in 0..6 {
        send_json(
            &mut socket,
            serde_json::json!({"request_id": format!("u{}", i), "type": "get_unread"}),
        )
        .await;
    }

    // Reading keeps answering pings while the queued commands run
    for i in 0..6 {
        let ack = next_json(&mut socket).await;
        assert_eq!(ack["event_type"], "ack");
        assert_eq!(ack["request_id"], format!("u{}", i));
    }
}

#[tokio::test]
async fn test_silent_peer_is_cleaned_up_after_heartbeat_timeout() {
    let config = test_config_builder()
        .heartbeat(Duration::from_millis(100), Duration::from_millis(150))
        .connection_grace(Duration::from_secs(20))
        .build()
        .unwrap();
    let server = start_test_server_with(config, MemoryStore::new()).await;
    server.store.start_session("live-silent").await;
    let mut socket = open(&server, Uuid::new_v4(), "ada").await;

    send_json(
        &mut socket,
        serde_json::json!({"request_id": "v1", "type": "join_viewer", "session_id": "live-silent"}),
    )
    .await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["payload"]["viewers"], 1);

    // Keep the socket open but stop reading, so pings go unanswered
    let released = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if server.store.session_snapshot("live-silent").await.unwrap().viewers == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "viewer was not released after the heartbeat failed");
    drop(socket);
}
