use std::time::Duration;

use bson::oid::ObjectId;
use fieldchat_client::{
    ClientConfig, ClientError, Connection, ErrorCode, MessagePayload, ParticipantKind, TypingEvent,
};
use serde_json::Value;
use tokio::{net::TcpListener, sync::mpsc};

use crate::fixtures::test_app::{DELIVERY_TIMEOUT, SILENCE, TestApp};

fn message_feed(conn: &Connection) -> mpsc::UnboundedReceiver<MessagePayload> {
    let (tx, rx) = mpsc::unbounded_channel();
    conn.on_message(move |m| {
        let _ = tx.send(m.clone());
    });
    rx
}

fn typing_feed(conn: &Connection) -> mpsc::UnboundedReceiver<TypingEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    conn.on_typing(move |e| {
        let _ = tx.send(e.clone());
    });
    rx
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(DELIVERY_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("feed closed")
}

async fn assert_nothing<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    let res = tokio::time::timeout(SILENCE, rx.recv()).await;
    assert!(res.is_err(), "expected nothing, got {res:?}");
}

async fn burst(conn: &Connection, room_id: &str, tag: &str) {
    for i in 0..20 {
        conn.send(room_id, &format!("{tag}-{i}")).await.unwrap();
    }
}

fn rejection(result: Result<impl Sized, ClientError>) -> ErrorCode {
    match result {
        Err(ClientError::Rejected { code, .. }) => code,
        Err(other) => panic!("expected rejection, got {other:?}"),
        Ok(_) => panic!("expected rejection, got success"),
    }
}

#[tokio::test]
async fn client_and_technician_hold_a_conversation() {
    let app = TestApp::spawn().await;
    let client_id = ObjectId::new().to_hex();
    let technician_id = ObjectId::new().to_hex();
    let intervention_id = ObjectId::new().to_hex();

    let client = app.connect_as(&client_id, ParticipantKind::Client).await;
    let tech = app.connect_as(&technician_id, ParticipantKind::Technician).await;
    assert_ne!(client.session_id(), tech.session_id());

    let room = app
        .resolve_room(&client_id, &technician_id, &intervention_id)
        .await;
    let room_id = room["id"].as_str().unwrap();

    client.join_room(room_id).await.unwrap();
    tech.join_room(room_id).await.unwrap();
    let mut client_feed = message_feed(&client);
    let mut tech_feed = message_feed(&tech);

    client.send(room_id, "Hello").await.unwrap();
    let got = next(&mut tech_feed).await;
    assert_eq!(got.content, "Hello");
    assert_eq!(got.sender_id, client_id);

    tech.send(room_id, "Hi back").await.unwrap();
    let got = next(&mut client_feed).await;
    assert_eq!(got.content, "Hi back");
    assert_eq!(got.sender_id, technician_id);

    let history = app.history(room_id).await;
    let contents: Vec<&str> = history["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["Hello", "Hi back"]);

    client.disconnect().await;
    tech.disconnect().await;
}

#[tokio::test]
async fn send_before_join_is_refused_and_not_stored() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let conn = app.connect_as(&room.client_id, ParticipantKind::Client).await;

    let code = rejection(conn.send(&room.room_id, "hello?").await);
    assert_eq!(code, ErrorCode::NotAMember);

    assert_eq!(app.history(&room.room_id).await["total"], 0);
}

#[tokio::test]
async fn other_party_receives_and_sender_does_not() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let client = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let tech = app
        .join_as(&room.technician_id, ParticipantKind::Technician, &room.room_id)
        .await;
    let mut client_feed = message_feed(&client);
    let mut tech_feed = message_feed(&tech);

    let sent = client.send(&room.room_id, "running late").await.unwrap();
    assert_eq!(sent.sender_id, room.client_id);
    assert_eq!(sent.room_id, room.room_id);
    assert!(!sent.read);

    let got = next(&mut tech_feed).await;
    assert_eq!(got, sent);
    assert_nothing(&mut client_feed).await;
}

#[tokio::test]
async fn content_bounds_are_enforced() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let client = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let tech = app
        .join_as(&room.technician_id, ParticipantKind::Technician, &room.room_id)
        .await;
    let mut tech_feed = message_feed(&tech);

    let too_long = "x".repeat(1001);
    for bad in ["", "   \n\t ", too_long.as_str()] {
        let code = rejection(client.send(&room.room_id, bad).await);
        assert_eq!(code, ErrorCode::InvalidContent);
    }
    assert_nothing(&mut tech_feed).await;

    // Exactly at the limit, counted in characters rather than bytes.
    let at_limit = "é".repeat(1000);
    let sent = client.send(&room.room_id, &at_limit).await.unwrap();
    assert_eq!(sent.content, at_limit);
    assert_eq!(next(&mut tech_feed).await.content, at_limit);

    assert_eq!(app.history(&room.room_id).await["total"], 1);
}

#[tokio::test]
async fn concurrent_senders_are_seen_in_history_order() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let client = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let tech = app
        .join_as(&room.technician_id, ParticipantKind::Technician, &room.room_id)
        .await;
    let watcher = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let mut feed = message_feed(&watcher);

    tokio::join!(
        burst(&client, &room.room_id, "c"),
        burst(&tech, &room.room_id, "t"),
    );

    let mut observed = Vec::new();
    for _ in 0..40 {
        observed.push(next(&mut feed).await.id);
    }

    let history = app.history(&room.room_id).await;
    let stored: Vec<String> = history["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(observed, stored);
}

#[tokio::test]
async fn typing_reaches_the_other_party_only() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let client = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let tech = app
        .join_as(&room.technician_id, ParticipantKind::Technician, &room.room_id)
        .await;
    let mut client_typing = typing_feed(&client);
    let mut tech_typing = typing_feed(&tech);

    tech.send_typing(&room.room_id, true).unwrap();

    let event = next(&mut client_typing).await;
    assert_eq!(
        event,
        TypingEvent {
            room_id: room.room_id.clone(),
            sender_id: room.technician_id.clone(),
            is_typing: true,
        }
    );
    assert_nothing(&mut tech_typing).await;
    assert_eq!(app.history(&room.room_id).await["total"], 0);
}

#[tokio::test]
async fn joining_checks_room_and_participant() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;

    let outsider = app
        .connect_as(&ObjectId::new().to_hex(), ParticipantKind::Technician)
        .await;
    let code = rejection(outsider.join_room(&room.room_id).await);
    assert_eq!(code, ErrorCode::NotAParticipant);

    let client = app.connect_as(&room.client_id, ParticipantKind::Client).await;
    let code = rejection(client.join_room(&ObjectId::new().to_hex()).await);
    assert_eq!(code, ErrorCode::RoomNotFound);
}

#[tokio::test]
async fn leaving_twice_is_harmless_and_stops_delivery() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let client = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let tech = app
        .join_as(&room.technician_id, ParticipantKind::Technician, &room.room_id)
        .await;
    let mut tech_feed = message_feed(&tech);

    tech.leave_room(&room.room_id).await.unwrap();
    tech.leave_room(&room.room_id).await.unwrap();

    client.send(&room.room_id, "anyone there?").await.unwrap();
    assert_nothing(&mut tech_feed).await;
}

#[tokio::test]
async fn unsubscribed_handler_stops_receiving() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let client = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let tech = app
        .join_as(&room.technician_id, ParticipantKind::Technician, &room.room_id)
        .await;

    let (tx, mut dropped) = mpsc::unbounded_channel::<MessagePayload>();
    let id = tech.on_message(move |m| {
        let _ = tx.send(m.clone());
    });
    let mut kept = message_feed(&tech);

    assert!(tech.unsubscribe(id));
    assert!(!tech.unsubscribe(id));

    client.send(&room.room_id, "ping").await.unwrap();
    assert_eq!(next(&mut kept).await.content, "ping");
    assert!(dropped.try_recv().is_err());
}

#[tokio::test]
async fn disconnect_clears_presence() {
    let app = TestApp::spawn().await;
    let room = app.seed_room().await;
    let client = app
        .join_as(&room.client_id, ParticipantKind::Client, &room.room_id)
        .await;
    let tech = app
        .join_as(&room.technician_id, ParticipantKind::Technician, &room.room_id)
        .await;
    assert_eq!(app.state.chat.presence.session_count(), 2);

    tech.disconnect().await;

    let cleared = tokio::time::timeout(DELIVERY_TIMEOUT, async {
        loop {
            let health: Value = app.get("/health").send().await.unwrap().json().await.unwrap();
            if health["sessions"] == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(cleared.is_ok(), "session was not dropped");

    // The remaining member can still send; nobody is left to receive it.
    client.send(&room.room_id, "bye").await.unwrap();
    assert_eq!(app.history(&room.room_id).await["total"], 1);
}

#[tokio::test]
async fn connect_times_out_when_server_never_answers() {
    // Accepts TCP at the kernel level but never completes the handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());

    let config = ClientConfig::new(ObjectId::new().to_hex(), ParticipantKind::Client)
        .with_connect_timeout(Duration::from_millis(200));
    let result = tokio::time::timeout(DELIVERY_TIMEOUT, fieldchat_client::connect(&endpoint, config))
        .await
        .expect("connector ignored its own timeout");

    assert!(matches!(result, Err(ClientError::Connection(_))));
    drop(listener);
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(ObjectId::new().to_hex(), ParticipantKind::Client)
        .with_connect_timeout(Duration::from_secs(2));
    let result = fieldchat_client::connect(&format!("ws://{addr}"), config).await;

    assert!(matches!(result, Err(ClientError::Connection(_))));
}

#[tokio::test]
async fn connect_with_bad_participant_id_fails() {
    let app = TestApp::spawn().await;
    let config = ClientConfig::new("not-an-object-id", ParticipantKind::Client)
        .with_display_name("Ghost")
        .with_connect_timeout(Duration::from_secs(2));

    let result = fieldchat_client::connect(&app.ws_endpoint(), config).await;
    assert!(matches!(result, Err(ClientError::Connection(_))));
}
