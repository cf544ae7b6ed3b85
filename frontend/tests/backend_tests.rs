//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Backend link tests over a real WebSocket: secret enforcement, event
//! dispatch, and the soft-boot handoff that keeps sessions alive across
//! link churn.

use futures_util::{SinkExt, StreamExt};
use mudgate_frontend::envelope::{
    Envelope, LoadPlayersPayload, OutputPayload, SessionCommandPayload, SignInPayload,
    SignOutPayload, event,
};
use mudgate_frontend::{
    FrontendConfig, LinkRegistry, Session, SessionMessage, SessionRegistry, TransportKind,
    backend,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, client_async};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const TICK: Duration = Duration::from_secs(5);
const SECRET: &str = "X";

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    registry: Arc<SessionRegistry>,
    links: Arc<LinkRegistry>,
    addr: SocketAddr,
    shutdown: CancellationToken,
}

/// Start the real backend accept loop on an ephemeral port.
async fn start_backend() -> Harness {
    let config = Arc::new(FrontendConfig::default());
    let registry = Arc::new(SessionRegistry::new(SECRET, &config));
    let links = Arc::new(LinkRegistry::new());
    let tracker = TaskTracker::new();
    let shutdown = CancellationToken::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(backend::serve_backend(
        listener,
        registry.clone(),
        links.clone(),
        config,
        tracker,
        shutdown.clone(),
    ));

    Harness {
        registry,
        links,
        addr,
        shutdown,
    }
}

async fn connect_game(addr: SocketAddr) -> WsClient {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (websocket, _) = client_async(format!("ws://{addr}/"), MaybeTlsStream::Plain(stream))
        .await
        .unwrap();
    websocket
}

/// Receive frames until one matches `wanted`, skipping heartbeats.
async fn await_event(websocket: &mut WsClient, wanted: &str) -> Envelope {
    loop {
        let frame = timeout(TICK, websocket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("websocket closed")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            let envelope = Envelope::parse(&text).unwrap();
            if envelope.event == wanted {
                return envelope;
            }
            assert_eq!(
                envelope.event, "heartbeat",
                "unexpected event before {wanted}"
            );
        }
    }
}

fn register_session(
    harness: &Harness,
    kind: TransportKind,
    port: u16,
) -> (Arc<Session>, mpsc::Receiver<SessionMessage>) {
    let peer: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let session = Session::new(peer, kind, None);
    let receiver = harness.registry.register(&session);
    (session, receiver)
}

async fn send_event<T: serde::Serialize>(
    websocket: &mut WsClient,
    event_name: &str,
    secret: &str,
    payload: &T,
) {
    let envelope = Envelope::with_payload(event_name, secret, payload).unwrap();
    websocket
        .send(Message::Text(envelope.to_json().unwrap()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_output_dispatched_to_session_queue() {
    let harness = start_backend().await;
    let (session, mut outbound) = register_session(&harness, TransportKind::Telnet, 55000);

    let mut game = connect_game(harness.addr).await;
    // The registry was non-empty at accept, so the first frame is the
    // snapshot.
    await_event(&mut game, "game/load_players").await;

    send_event(
        &mut game,
        event::PLAYERS_OUTPUT,
        SECRET,
        &OutputPayload {
            uuid: session.id().to_string(),
            message: "A dark room.\r\n".to_string(),
            is_prompt: "false".to_string(),
        },
    )
    .await;

    let message = timeout(TICK, outbound.recv()).await.unwrap().unwrap();
    assert_eq!(message, SessionMessage::io("A dark room.\r\n"));

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_bad_secret_has_no_downstream_effect() {
    let harness = start_backend().await;
    let (session, mut outbound) = register_session(&harness, TransportKind::Telnet, 55000);

    let mut game = connect_game(harness.addr).await;
    await_event(&mut game, "game/load_players").await;

    send_event(
        &mut game,
        event::PLAYERS_OUTPUT,
        "WRONG",
        &OutputPayload {
            uuid: session.id().to_string(),
            message: "forged\r\n".to_string(),
            is_prompt: "false".to_string(),
        },
    )
    .await;
    // The link must survive the bad frame: a correctly-signed frame sent
    // afterwards is the first and only thing the session sees.
    send_event(
        &mut game,
        event::PLAYERS_OUTPUT,
        SECRET,
        &OutputPayload {
            uuid: session.id().to_string(),
            message: "genuine\r\n".to_string(),
            is_prompt: "false".to_string(),
        },
    )
    .await;

    let message = timeout(TICK, outbound.recv()).await.unwrap().unwrap();
    assert_eq!(message, SessionMessage::io("genuine\r\n"));
    assert!(outbound.try_recv().is_err());

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_echo_commands_translate_for_telnet_only() {
    let harness = start_backend().await;
    let (telnet_session, mut telnet_outbound) =
        register_session(&harness, TransportKind::Telnet, 55000);
    let (ssh_session, mut ssh_outbound) = register_session(&harness, TransportKind::Ssh, 55001);

    let mut game = connect_game(harness.addr).await;
    await_event(&mut game, "game/load_players").await;

    for session in [&telnet_session, &ssh_session] {
        send_event(
            &mut game,
            event::PLAYER_SESSION_COMMAND,
            SECRET,
            &SessionCommandPayload {
                uuid: session.id().to_string(),
                command: "dont echo".to_string(),
            },
        )
        .await;
    }
    send_event(
        &mut game,
        event::PLAYER_SESSION_COMMAND,
        SECRET,
        &SessionCommandPayload {
            uuid: telnet_session.id().to_string(),
            command: "do echo".to_string(),
        },
    )
    .await;
    // A trailing output frame proves the dispatcher processed everything.
    send_event(
        &mut game,
        event::PLAYERS_OUTPUT,
        SECRET,
        &OutputPayload {
            uuid: ssh_session.id().to_string(),
            message: "done".to_string(),
            is_prompt: "false".to_string(),
        },
    )
    .await;

    let first = timeout(TICK, telnet_outbound.recv()).await.unwrap().unwrap();
    assert_eq!(
        first,
        SessionMessage::TelnetCommand(mudgate_telnetcodec::echo_off())
    );
    let second = timeout(TICK, telnet_outbound.recv()).await.unwrap().unwrap();
    assert_eq!(
        second,
        SessionMessage::TelnetCommand(mudgate_telnetcodec::echo_on())
    );

    // The SSH session saw only the trailing output, never an echo command.
    let ssh_message = timeout(TICK, ssh_outbound.recv()).await.unwrap().unwrap();
    assert_eq!(ssh_message, SessionMessage::io("done"));

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_sign_out_delivers_goodbye_and_disconnects() {
    let harness = start_backend().await;
    let (session, mut outbound) = register_session(&harness, TransportKind::Telnet, 55000);

    let mut game = connect_game(harness.addr).await;
    await_event(&mut game, "game/load_players").await;

    send_event(
        &mut game,
        event::PLAYERS_SIGN_OUT,
        SECRET,
        &SignOutPayload {
            name: "alice".to_string(),
            message: "Goodbye!\r\n".to_string(),
            uuid: session.id().to_string(),
        },
    )
    .await;

    let message = timeout(TICK, outbound.recv()).await.unwrap().unwrap();
    assert_eq!(message, SessionMessage::io("Goodbye!\r\n"));

    // The dispatcher flipped the state; the worker supervisor would now
    // unwind and unregister.
    let deadline = tokio::time::Instant::now() + TICK;
    while session.is_connected() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::task::yield_now().await;
    }

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_upstream_envelopes_reach_the_game() {
    let harness = start_backend().await;
    let (session, _outbound) = register_session(&harness, TransportKind::Telnet, 55000);

    let mut game = connect_game(harness.addr).await;
    await_event(&mut game, "game/load_players").await;

    harness.registry.player_input(&session, "north");

    // connection/connected was queued at registration, before the link
    // existed; the backlog drains in order.
    let connected = await_event(&mut game, "connection/connected").await;
    assert!(connected.has_valid_secret(SECRET));
    let input = await_event(&mut game, "player/input").await;
    let payload: mudgate_frontend::envelope::PlayerInputPayload = input.payload_as().unwrap();
    assert_eq!(payload.msg, "north");

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_softboot_preserves_sessions_and_resends_snapshot() {
    let harness = start_backend().await;
    let (alice, _alice_outbound) = register_session(&harness, TransportKind::Telnet, 55000);
    let (bob, _bob_outbound) = register_session(&harness, TransportKind::Ssh, 55001);

    // First link: learns about both sessions, names one, then goes away.
    let mut first_link = connect_game(harness.addr).await;
    await_event(&mut first_link, "game/load_players").await;
    send_event(
        &mut first_link,
        event::PLAYERS_SIGN_IN,
        SECRET,
        &SignInPayload {
            name: "Alice".to_string(),
            uuid: alice.id().to_string(),
        },
    )
    .await;

    // Wait for the sign-in to land before bouncing the link.
    let deadline = tokio::time::Instant::now() + TICK;
    while alice.name().is_empty() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::task::yield_now().await;
    }

    first_link.close(None).await.unwrap();
    let deadline = tokio::time::Instant::now() + TICK;
    while harness.links.has_active() {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Sessions survive the bounce with unchanged ids.
    assert_eq!(harness.registry.len(), 2);
    assert!(harness.registry.get(&alice.id()).is_some());
    assert!(harness.registry.get(&bob.id()).is_some());

    // Second link: the very first frame is the two-entry snapshot.
    let mut second_link = connect_game(harness.addr).await;
    let frame = timeout(TICK, second_link.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Message::Text(text) = frame else {
        panic!("expected a text frame");
    };
    let envelope = Envelope::parse(&text).unwrap();
    assert_eq!(envelope.event, "game/load_players");

    let payload: LoadPlayersPayload = envelope.payload_as().unwrap();
    assert_eq!(payload.players.len(), 2);
    let record = &payload.players[&alice.id().to_string()];
    assert_eq!(record.0, "alice");
    assert_eq!(record.2, 55000);
    assert_eq!(payload.players[&bob.id().to_string()].2, 55001);

    harness.shutdown.cancel();
}

#[tokio::test]
async fn test_empty_registry_sends_no_snapshot() {
    let harness = start_backend().await;
    let mut game = connect_game(harness.addr).await;

    // With no sessions, the first frame is a plain heartbeat.
    let frame = timeout(TICK, game.next()).await.unwrap().unwrap().unwrap();
    let Message::Text(text) = frame else {
        panic!("expected a text frame");
    };
    let envelope = Envelope::parse(&text).unwrap();
    assert_eq!(envelope.event, "heartbeat");
    assert!(envelope.tasks.is_some());

    harness.shutdown.cancel();
}
