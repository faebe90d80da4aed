// ==================
// ricecoco-session/src/channel.rs
// ==================
//! Session Channel Module
//!
//! Client side of the live meeting session. It provides:
//! - The [`SessionChannel`] operations (join, send location, arrive, cancel,
//!   finish, break up, remove listeners)
//! - [`Subscription`]s to the partner's events, cancelled by dropping them
//! - [`SocketClient`], the websocket implementation
//!
//! Operations that need the service's confirmation (cancel, finish, break
//! up) carry a request id and resolve once the matching `ack` frame arrives.
//! Everything else is fire-and-forget. There is no retry; a dropped
//! connection closes every subscription and fails the pending waits.

use crate::error::{Result, SessionError};
use crate::metrics as keys;
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use parking_lot::Mutex;
use ricecoco_common::{ClientEvent, CurrentMeeting, Location, RequestId, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the outbound queue feeding the socket writer
const OUTBOUND_QUEUE: usize = 64;

/// Partner-side events delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The shared meeting state changed
    MeetingChanged(CurrentMeeting),
    /// The partner's latest location
    PartnerLocation(Location),
    /// The partner cancelled the meeting
    CancelledByPartner,
}

impl SessionEvent {
    /// Subscriber-facing view of a server frame; acks are not events
    pub fn from_server(event: ServerEvent) -> Option<Self> {
        match event {
            ServerEvent::ChangeCurrentMeeting { meeting } => Some(SessionEvent::MeetingChanged(meeting)),
            ServerEvent::GetPartnerLocation { location } => Some(SessionEvent::PartnerLocation(location)),
            ServerEvent::CanceledByPartner => Some(SessionEvent::CancelledByPartner),
            ServerEvent::Ack { .. } => None,
        }
    }
}

/// Operations of the live session service
#[async_trait]
pub trait SessionChannel: Send + Sync {
    async fn join_meeting(&self, meeting_id: &str, user_id: &str) -> Result<()>;

    async fn send_location(&self, location: Location) -> Result<()>;

    async fn arrive_meeting(&self) -> Result<()>;

    /// Resolves once the service acknowledged the cancellation
    async fn cancel_meeting(&self) -> Result<()>;

    /// Resolves once the service acknowledged the finish
    async fn finish_meeting(&self) -> Result<()>;

    /// Resolves once the service acknowledged the break-up
    async fn breakup_meeting(&self) -> Result<()>;

    /// Start receiving partner events
    fn subscribe(&self) -> Subscription;

    /// Close every subscription handed out so far
    fn remove_all_listeners(&self);
}

/// Stream of [`SessionEvent`]s. Dropping it unsubscribes.
///
/// Each subscriber owns an unbounded queue, so a slow consumer never loses
/// meeting updates or a cancellation.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Subscription {
    /// Next event, or `None` once the listeners were removed or the
    /// connection went away
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }
}

/// Fan-out of inbound events to the current set of subscribers
pub struct Listeners {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Subscription { rx }
    }

    /// Deliver to every live subscriber; returns how many received it
    pub fn emit(&self, event: SessionEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Drop every sender so existing subscriptions end
    pub fn remove_all(&self) {
        self.subscribers.lock().clear();
    }

    pub fn count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}

/// Websocket implementation of [`SessionChannel`]
pub struct SocketClient {
    outbound: mpsc::Sender<ClientEvent>,
    pending: Arc<DashMap<RequestId, oneshot::Sender<()>>>,
    listeners: Arc<Listeners>,
    ack_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SocketClient {
    /// Open the websocket and start the reader/writer tasks
    pub async fn connect(url: &str, ack_timeout: Duration) -> Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        info!(url, "Connected to session service");

        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<ClientEvent>(OUTBOUND_QUEUE);
        let pending: Arc<DashMap<RequestId, oneshot::Sender<()>>> = Arc::new(DashMap::new());
        let listeners = Arc::new(Listeners::new());

        // Task 1: drain the outbound queue into the socket
        let writer = tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode session event");
                        continue;
                    },
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!(error = %e, "Session socket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Task 2: route acks to their waiters, everything else to subscribers
        let reader_pending = pending.clone();
        let reader_listeners = listeners.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        route_frame(text.as_str(), &reader_pending, &reader_listeners);
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {},
                    Err(e) => {
                        warn!(error = %e, "Session socket read failed");
                        break;
                    },
                }
            }
            info!("Session service connection closed");
            // waiters see their sender dropped, subscribers see Closed
            reader_pending.clear();
            reader_listeners.remove_all();
        });

        Ok(Self {
            outbound,
            pending,
            listeners,
            ack_timeout,
            reader,
            writer,
        })
    }

    async fn emit(&self, event: ClientEvent) -> Result<()> {
        self.outbound.send(event).await?;
        Ok(())
    }

    async fn request(
        &self,
        operation: &'static str,
        make: impl FnOnce(RequestId) -> ClientEvent + Send,
    ) -> Result<()> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        if let Err(e) = self.emit(make(request_id)).await {
            self.pending.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(ack) => {
                ack?;
                debug!(operation, %request_id, "Acknowledged");
                Ok(())
            },
            Err(_) => {
                self.pending.remove(&request_id);
                Err(SessionError::AckTimeout {
                    operation,
                    timeout_secs: self.ack_timeout.as_secs(),
                })
            },
        }
    }
}

fn route_frame(
    text: &str,
    pending: &DashMap<RequestId, oneshot::Sender<()>>,
    listeners: &Listeners,
) {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed session frame");
            return;
        },
    };

    if let ServerEvent::Ack { request_id } = event {
        match pending.remove(&request_id) {
            Some((_, waiter)) => {
                let _ = waiter.send(());
            },
            None => debug!(%request_id, "Ack for unknown or expired request"),
        }
        return;
    }

    if let Some(event) = SessionEvent::from_server(event) {
        counter!(keys::PEER_EVENT).increment(1);
        listeners.emit(event);
    }
}

#[async_trait]
impl SessionChannel for SocketClient {
    async fn join_meeting(&self, meeting_id: &str, user_id: &str) -> Result<()> {
        self.emit(ClientEvent::JoinMeeting {
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
        })
        .await
    }

    async fn send_location(&self, location: Location) -> Result<()> {
        self.emit(ClientEvent::SendLocation { location }).await
    }

    async fn arrive_meeting(&self) -> Result<()> {
        self.emit(ClientEvent::ArriveMeeting).await
    }

    async fn cancel_meeting(&self) -> Result<()> {
        self.request("cancelMeeting", |request_id| ClientEvent::CancelMeeting { request_id })
            .await
    }

    async fn finish_meeting(&self) -> Result<()> {
        self.request("finishMeeting", |request_id| ClientEvent::FinishMeeting { request_id })
            .await
    }

    async fn breakup_meeting(&self) -> Result<()> {
        self.request("breakupMeeting", |request_id| ClientEvent::BreakupMeeting { request_id })
            .await
    }

    fn subscribe(&self) -> Subscription {
        self.listeners.subscribe()
    }

    fn remove_all_listeners(&self) {
        self.listeners.remove_all();
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
