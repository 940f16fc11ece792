use std::net::SocketAddr;
use std::time::Duration;

use chatlink::client::ChatClient;
use chatlink::config::ClientConfig;
use chatlink::controller::{ChatUpdate, NOT_DELIVERED_TEXT, SendOutcome, WELCOME_TEXT};
use chatlink::message_log::{MessageEntry, STATUS_SENDER, Severity, USER_SENDER};
use chatlink::reconnect::{
    Backoff, ConnectionState, ReconnectSettings, STATUS_CONNECTED, STATUS_DISCONNECTED, STATUS_TRANSPORT_ERROR,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

const WAIT: Duration = Duration::from_secs(5);

fn config_for(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        ws_url: format!("ws://{addr}"),
        reconnect: ReconnectSettings { delay: Duration::from_millis(50), backoff: Backoff::Fixed },
        ..ClientConfig::default()
    }
}

async fn next_entry(rx: &mut broadcast::Receiver<ChatUpdate>) -> MessageEntry {
    loop {
        let update = timeout(WAIT, rx.recv())
            .await
            .expect("update receive timed out")
            .expect("update channel closed unexpectedly");
        if let ChatUpdate::Appended(entry) = update {
            return entry;
        }
    }
}

async fn accept_backend(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = timeout(WAIT, listener.accept())
        .await
        .expect("client never connected")
        .expect("accept failed");
    accept_async(tcp).await.expect("websocket handshake failed")
}

async fn push(server: &mut WebSocketStream<TcpStream>, payload: serde_json::Value) {
    server
        .send(Message::Text(payload.to_string().into()))
        .await
        .expect("backend send failed");
}

#[tokio::test]
async fn session_lifecycle_against_local_backend() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ChatClient { handle, mut updates, task } = ChatClient::spawn(&config_for(addr));

    let welcome = next_entry(&mut updates).await;
    assert_eq!(welcome.id, 1);
    assert_eq!(welcome.text, WELCOME_TEXT);

    let mut server = accept_backend(&listener).await;
    let connected = next_entry(&mut updates).await;
    assert_eq!(connected.text, STATUS_CONNECTED);
    assert_eq!(connected.severity, Severity::Success);
    assert_eq!(handle.connection_state().await.unwrap(), ConnectionState::Connected);

    // Outbound turn reaches the backend verbatim.
    assert_eq!(handle.send_user_text("hi").await.unwrap(), SendOutcome::Sent);
    let user = next_entry(&mut updates).await;
    assert_eq!(user.sender, USER_SENDER);
    assert_eq!(user.text, "hi");
    let frame = timeout(WAIT, server.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(frame.to_text().unwrap(), r#"{"text":"hi"}"#);

    // Inbound: control sender filtered, plain and input-request events classified.
    push(&mut server, serde_json::json!({ "sender": "UserProxy", "text": "Enter your response:" })).await;
    push(&mut server, serde_json::json!({ "sender": "ScientistAgent", "text": "Light bends.", "timestamp": 1.5 })).await;
    push(&mut server, serde_json::json!({ "not": "a chat event" })).await;
    push(
        &mut server,
        serde_json::json!({ "sender": "ArtistAgent", "text": "Which colour?", "requires_input": true }),
    )
    .await;

    let scientist = next_entry(&mut updates).await;
    assert_eq!(scientist.sender, "ScientistAgent");
    assert_eq!(scientist.severity, Severity::Normal);
    let artist = next_entry(&mut updates).await;
    assert_eq!(artist.sender, "ArtistAgent");
    assert_eq!(artist.severity, Severity::Warning);

    // Backend drops the connection; the client reports it and reconnects.
    server.close(None).await.unwrap();
    drop(server);
    let lost = next_entry(&mut updates).await;
    assert_eq!(lost.sender, STATUS_SENDER);
    assert_eq!(lost.text, STATUS_DISCONNECTED);
    assert_eq!(lost.severity, Severity::Error);

    let mut server = accept_backend(&listener).await;
    let reconnected = next_entry(&mut updates).await;
    assert_eq!(reconnected.text, STATUS_CONNECTED);

    let snapshot = handle.snapshot().await.unwrap();
    let texts: Vec<&str> = snapshot.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            WELCOME_TEXT,
            STATUS_CONNECTED,
            "hi",
            "Light bends.",
            "Which colour?",
            STATUS_DISCONNECTED,
            STATUS_CONNECTED,
        ]
    );
    assert!(snapshot.windows(2).all(|pair| pair[0].id < pair[1].id));

    // Stopping releases the live session.
    handle.stop().await.unwrap();
    task.await.unwrap();
    let closing = timeout(WAIT, server.next()).await.expect("session was not released");
    assert!(matches!(closing, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

#[tokio::test]
async fn unreachable_backend_keeps_retrying_and_reports_undelivered_sends() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let ChatClient { handle, mut updates, task } = ChatClient::spawn(&config_for(addr));

    let mut disconnects = 0;
    while disconnects < 2 {
        if next_entry(&mut updates).await.text == STATUS_DISCONNECTED {
            disconnects += 1;
        }
    }

    assert_eq!(handle.send_user_text("anyone there?").await.unwrap(), SendOutcome::NotConnected);
    let snapshot = handle.snapshot().await.unwrap();
    let at = snapshot
        .iter()
        .position(|e| e.sender == USER_SENDER)
        .expect("user entry recorded");
    assert_eq!(snapshot[at].text, "anyone there?");
    assert_eq!(snapshot[at + 1].text, NOT_DELIVERED_TEXT);
    assert_eq!(snapshot[at + 1].severity, Severity::Error);

    handle.stop().await.unwrap();
    task.await.unwrap();
    assert!(handle.snapshot().await.is_err());
}

#[tokio::test]
async fn stalled_handshake_times_out_and_retries() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted_tx, mut accepted_rx) = tokio::sync::mpsc::unbounded_channel();
    // Accept TCP but never answer the websocket upgrade.
    let backend = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
            let _ = accepted_tx.send(());
        }
    });

    let config = ClientConfig { connect_timeout: Duration::from_millis(200), ..config_for(addr) };
    let ChatClient { handle, mut updates, task } = ChatClient::spawn(&config);

    assert_eq!(next_entry(&mut updates).await.text, WELCOME_TEXT);
    let error = next_entry(&mut updates).await;
    assert_eq!(error.sender, STATUS_SENDER);
    assert_eq!(error.text, STATUS_TRANSPORT_ERROR);
    assert_eq!(error.severity, Severity::Error);
    let lost = next_entry(&mut updates).await;
    assert_eq!(lost.text, STATUS_DISCONNECTED);

    // The retry stalls the same way.
    assert_eq!(next_entry(&mut updates).await.text, STATUS_TRANSPORT_ERROR);
    assert_eq!(next_entry(&mut updates).await.text, STATUS_DISCONNECTED);
    for _ in 0..2 {
        timeout(WAIT, accepted_rx.recv()).await.expect("no connection attempt").unwrap();
    }

    handle.stop().await.unwrap();
    task.await.unwrap();
    backend.abort();
}
