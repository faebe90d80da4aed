//! Integration tests for the websocket session client against a local
//! stand-in of the session service.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use ricecoco_common::{ClientEvent, CurrentMeeting, Location, ServerEvent};
use ricecoco_session::channel::{SessionChannel, SessionEvent, SocketClient};
use ricecoco_session::SessionError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

type Received = Arc<Mutex<Vec<ClientEvent>>>;

/// Acks cancel/finish, never acks break-up, answers a join with a meeting
/// snapshot and closes the socket on `arriveMeeting` when `close_on_arrive`.
async fn handle_socket(mut socket: WebSocket, received: Received, close_on_arrive: bool) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let event: ClientEvent = serde_json::from_str(text.as_str()).unwrap();
        received.lock().push(event.clone());

        let reply = match &event {
            ClientEvent::JoinMeeting { meeting_id, .. } => Some(ServerEvent::ChangeCurrentMeeting {
                meeting: CurrentMeeting {
                    meeting_id: meeting_id.clone(),
                    arrival_count: 0,
                },
            }),
            ClientEvent::SendLocation { location } => Some(ServerEvent::GetPartnerLocation {
                location: Location::new(location.latitude + 0.001, location.longitude),
            }),
            ClientEvent::ArriveMeeting if close_on_arrive => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            },
            ClientEvent::BreakupMeeting { .. } => None,
            other => other.request_id().map(|request_id| ServerEvent::Ack { request_id }),
        };

        if let Some(reply) = reply {
            let json = serde_json::to_string(&reply).unwrap();
            if socket.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }
}

async fn setup_server(close_on_arrive: bool) -> (SocketAddr, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let state = received.clone();
    let app = Router::new().route(
        "/ws",
        get(move |ws: WebSocketUpgrade| {
            let received = state.clone();
            async move { ws.on_upgrade(move |socket| handle_socket(socket, received, close_on_arrive)) }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, received)
}

async fn next_event(sub: &mut ricecoco_session::channel::Subscription) -> Option<SessionEvent> {
    tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("Timed out waiting for session event")
}

#[tokio::test]
async fn test_join_delivers_meeting_snapshot() {
    let (addr, received) = setup_server(false).await;
    let client = SocketClient::connect(&format!("ws://{addr}/ws"), Duration::from_secs(5))
        .await
        .unwrap();
    let mut sub = client.subscribe();

    client.join_meeting("m1", "u1").await.unwrap();
    assert_eq!(
        next_event(&mut sub).await,
        Some(SessionEvent::MeetingChanged(CurrentMeeting {
            meeting_id: "m1".to_string(),
            arrival_count: 0,
        }))
    );

    client.send_location(Location::new(37.5, 127.0)).await.unwrap();
    assert_eq!(
        next_event(&mut sub).await,
        Some(SessionEvent::PartnerLocation(Location::new(37.501, 127.0)))
    );

    assert_eq!(
        received.lock()[0],
        ClientEvent::JoinMeeting {
            meeting_id: "m1".to_string(),
            user_id: "u1".to_string(),
        }
    );
}

#[tokio::test]
async fn test_acknowledged_operations_resolve() {
    let (addr, received) = setup_server(false).await;
    let client = SocketClient::connect(&format!("ws://{addr}/ws"), Duration::from_secs(5))
        .await
        .unwrap();

    client.arrive_meeting().await.unwrap();
    client.finish_meeting().await.unwrap();
    client.cancel_meeting().await.unwrap();

    // frames are written in order, so the fire-and-forget arrive got there first
    let received = received.lock().clone();
    assert_eq!(received[0], ClientEvent::ArriveMeeting);
    assert!(matches!(received[1], ClientEvent::FinishMeeting { .. }));
    assert!(matches!(received[2], ClientEvent::CancelMeeting { .. }));
}

#[tokio::test]
async fn test_missing_ack_times_out() {
    let (addr, _received) = setup_server(false).await;
    let client = SocketClient::connect(&format!("ws://{addr}/ws"), Duration::from_secs(1))
        .await
        .unwrap();

    let err = client.breakup_meeting().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::AckTimeout {
            operation: "breakupMeeting",
            ..
        }
    ));
}

#[tokio::test]
async fn test_remove_all_listeners_ends_subscriptions() {
    let (addr, _received) = setup_server(false).await;
    let client = SocketClient::connect(&format!("ws://{addr}/ws"), Duration::from_secs(5))
        .await
        .unwrap();
    let mut sub = client.subscribe();

    client.remove_all_listeners();
    assert_eq!(next_event(&mut sub).await, None);
}

#[tokio::test]
async fn test_server_close_ends_subscriptions() {
    let (addr, _received) = setup_server(true).await;
    let client = SocketClient::connect(&format!("ws://{addr}/ws"), Duration::from_secs(5))
        .await
        .unwrap();
    let mut sub = client.subscribe();

    client.arrive_meeting().await.unwrap();
    assert_eq!(next_event(&mut sub).await, None);
}

#[tokio::test]
async fn test_connect_to_nothing_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = SocketClient::connect(&format!("ws://{addr}/ws"), Duration::from_secs(1))
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_code(), "SOCK_001");
}

#[tokio::test]
async fn test_secure_url_attempts_tls_handshake() {
    use tokio_tungstenite::tungstenite::{error::UrlError, Error as WsError};

    // plain TCP peer that hangs up, so the TLS handshake fails
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let err = SocketClient::connect(&format!("wss://{addr}/ws"), Duration::from_secs(1))
        .await
        .err()
        .unwrap();
    assert!(
        !matches!(err, SessionError::Socket(WsError::Url(UrlError::TlsFeatureNotEnabled))),
        "wss support is not compiled in: {err:?}"
    );
    assert_eq!(err.error_code(), "SOCK_001");
}
