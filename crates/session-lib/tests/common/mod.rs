//! Test utilities for the session tests
//!
//! In-memory stand-ins for every collaborator of a [`MeetingSession`], so
//! scenarios can assert on exactly which remote calls, signals and
//! navigation actions were issued.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use ricecoco_common::{Location, Meeting};
use ricecoco_session::api::MeetingApi;
use ricecoco_session::channel::{Listeners, SessionChannel, SessionEvent, Subscription};
use ricecoco_session::location::LocationOptions;
use ricecoco_session::actions::Action;
use ricecoco_session::navigation::{Alert, Alerts, NavAction, NavigationStack, Navigator, Route, Screen};
use ricecoco_session::store::{Store, UserState};
use ricecoco_session::{MeetingSession, Result, SessionDeps, SessionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const RESTAURANT: Location = Location::new(37.5, 127.0);
/// Roughly 10 km north of the restaurant
pub const FAR_AWAY: Location = Location::new(37.59, 127.0);
pub const USER_ID: &str = "user-1";
pub const MEETING_ID: &str = "meeting-1";
pub const START_PROMISE: i32 = 5;

pub fn full_meeting() -> Meeting {
    Meeting {
        meeting_id: MEETING_ID.to_string(),
        restaurant_id: "restaurant-1".to_string(),
        restaurant_name: "Rice House".to_string(),
        restaurant_location: Some(RESTAURANT),
        partner_nickname: "coco".to_string(),
        expired_time: Some(Utc::now() + chrono::Duration::minutes(60)),
        arrival_count: 0,
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub meeting: Mutex<Option<Meeting>>,
    pub fail_promise: AtomicBool,
    pub fetches: Mutex<Vec<String>>,
    pub promise_calls: Mutex<Vec<(String, i32)>>,
}

impl FakeApi {
    pub fn serving(meeting: Meeting) -> Self {
        Self {
            meeting: Mutex::new(Some(meeting)),
            ..Self::default()
        }
    }

    pub fn failing_promise(&self) {
        self.fail_promise.store(true, Ordering::SeqCst);
    }

    pub fn promise_calls(&self) -> Vec<(String, i32)> {
        self.promise_calls.lock().clone()
    }
}

#[async_trait]
impl MeetingApi for FakeApi {
    async fn fetch_meeting(&self, meeting_id: &str) -> Result<Meeting> {
        self.fetches.lock().push(meeting_id.to_string());
        self.meeting.lock().clone().ok_or(SessionError::Api {
            status: 500,
            path: format!("/meetings/{meeting_id}"),
        })
    }

    async fn update_promise(&self, user_id: &str, amount: i32) -> Result<()> {
        self.promise_calls.lock().push((user_id.to_string(), amount));
        if self.fail_promise.load(Ordering::SeqCst) {
            return Err(SessionError::Api {
                status: 503,
                path: format!("/users/{user_id}/promise"),
            });
        }
        Ok(())
    }
}

/// What the session told the session service, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Join { meeting_id: String, user_id: String },
    Location(Location),
    Arrive,
    Cancel,
    Finish,
    Breakup,
    RemoveAllListeners,
}

#[derive(Default)]
pub struct FakeChannel {
    pub sent: Mutex<Vec<Sent>>,
    pub listeners: Listeners,
}

impl FakeChannel {
    /// Deliver an event as if the partner had sent it
    pub fn push(&self, event: SessionEvent) -> usize {
        self.listeners.emit(event)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn count(&self, wanted: &Sent) -> usize {
        self.sent.lock().iter().filter(|s| *s == wanted).count()
    }

    pub fn locations_sent(&self) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|s| matches!(s, Sent::Location(_)))
            .count()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().push(sent);
    }
}

#[async_trait]
impl SessionChannel for FakeChannel {
    async fn join_meeting(&self, meeting_id: &str, user_id: &str) -> Result<()> {
        self.record(Sent::Join {
            meeting_id: meeting_id.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn send_location(&self, location: Location) -> Result<()> {
        self.record(Sent::Location(location));
        Ok(())
    }

    async fn arrive_meeting(&self) -> Result<()> {
        self.record(Sent::Arrive);
        Ok(())
    }

    async fn cancel_meeting(&self) -> Result<()> {
        self.record(Sent::Cancel);
        Ok(())
    }

    async fn finish_meeting(&self) -> Result<()> {
        self.record(Sent::Finish);
        Ok(())
    }

    async fn breakup_meeting(&self) -> Result<()> {
        self.record(Sent::Breakup);
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.listeners.subscribe()
    }

    fn remove_all_listeners(&self) {
        self.record(Sent::RemoveAllListeners);
        self.listeners.remove_all();
    }
}

/// Acknowledges every alert immediately and remembers it
#[derive(Default)]
pub struct RecordingAlerts {
    pub shown: Mutex<Vec<Alert>>,
}

#[async_trait]
impl Alerts for RecordingAlerts {
    async fn confirm(&self, alert: Alert) {
        self.shown.lock().push(alert);
    }
}

pub struct Harness {
    pub store: Store,
    pub api: Arc<FakeApi>,
    pub channel: Arc<FakeChannel>,
    pub nav: Arc<NavigationStack>,
    pub alerts: Arc<RecordingAlerts>,
}

impl Harness {
    /// Store as the match screen leaves it: user signed in, meeting id selected
    pub fn new(api: FakeApi) -> Self {
        let store = Store::new(UserState {
            id: USER_ID.to_string(),
            nickname: "rice".to_string(),
            promise: START_PROMISE,
        });
        store.dispatch(Action::SetSelectedMeeting(Meeting {
            meeting_id: MEETING_ID.to_string(),
            ..Meeting::default()
        }));

        let nav = Arc::new(NavigationStack::new(Screen::MainMap));
        nav.dispatch(NavAction::Navigate(Route::to(Screen::MatchSuccess)));

        Self {
            store,
            api: Arc::new(api),
            channel: Arc::new(FakeChannel::default()),
            nav,
            alerts: Arc::new(RecordingAlerts::default()),
        }
    }

    pub fn deps(&self) -> SessionDeps {
        SessionDeps {
            store: self.store.clone(),
            api: self.api.clone(),
            channel: self.channel.clone(),
            navigator: self.nav.clone(),
            alerts: self.alerts.clone(),
        }
    }

    pub fn session(&self) -> MeetingSession {
        MeetingSession::new(self.deps(), 500.0, LocationOptions::default())
    }
}
