//! Injected application store: user, device location and meetings slices.
use crate::actions::Action;
use crate::meetings::{self, MeetingsState};
use parking_lot::RwLock;
use ricecoco_common::{CurrentMeeting, Location, Meeting};
use std::sync::Arc;

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserState {
    pub id: String,
    pub nickname: String,
    /// Kept/broken promise balance
    pub promise: i32,
}

#[derive(Debug, Clone, Default)]
struct AppState {
    user: UserState,
    location: Option<Location>,
    meetings: Arc<MeetingsState>,
}

fn reduce_user(user: UserState, action: &Action) -> UserState {
    match action {
        Action::SetPromiseAmount(amount) => UserState {
            promise: *amount,
            ..user
        },
        _ => user,
    }
}

fn reduce_location(location: Option<Location>, action: &Action) -> Option<Location> {
    match action {
        Action::SetUserLocation(next) => Some(*next),
        _ => location,
    }
}

/// Shared store handed to every component that needs application state
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<AppState>>,
}

impl Store {
    pub fn new(user: UserState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppState {
                user,
                ..AppState::default()
            })),
        }
    }

    /// Run every reducer over `action`
    pub fn dispatch(&self, action: Action) {
        tracing::trace!(action = action.name(), "dispatch");
        let mut state = self.inner.write();
        let meetings = std::mem::take(&mut state.meetings);
        state.meetings = meetings::reduce(meetings, &action);
        state.user = reduce_user(std::mem::take(&mut state.user), &action);
        state.location = reduce_location(state.location, &action);
    }

    pub fn user(&self) -> UserState {
        self.inner.read().user.clone()
    }

    pub fn user_location(&self) -> Option<Location> {
        self.inner.read().location
    }

    pub fn meetings(&self) -> Arc<MeetingsState> {
        self.inner.read().meetings.clone()
    }

    pub fn selected_meeting(&self) -> Meeting {
        self.inner.read().meetings.selected_meeting.clone()
    }

    pub fn current_meeting(&self) -> CurrentMeeting {
        self.inner.read().meetings.current_meeting.clone()
    }
}
