// ============================
// ricecoco-session/src/meetings.rs
// ============================
//! Meetings slice of the store: the candidate list and the selected meeting.
use crate::actions::Action;
use ricecoco_common::{CurrentMeeting, Meeting, MeetingSummary};
use std::sync::Arc;

/// State held by the meetings reducer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeetingsState {
    /// Candidates in the order the API returned them
    pub filtered_meetings: Vec<MeetingSummary>,
    /// The one meeting the user is currently matched into
    pub selected_meeting: Meeting,
    /// Live snapshot pushed by the session service
    pub current_meeting: CurrentMeeting,
}

/// Pure reducer over [`Action`].
///
/// Actions owned by other slices hand back the same `Arc`, so callers can
/// detect "nothing changed" with [`Arc::ptr_eq`].
pub fn reduce(state: Arc<MeetingsState>, action: &Action) -> Arc<MeetingsState> {
    match action {
        Action::SetMeetings(meetings) => Arc::new(MeetingsState {
            filtered_meetings: meetings.clone(),
            ..(*state).clone()
        }),
        Action::SetSelectedMeeting(meeting) => Arc::new(MeetingsState {
            selected_meeting: meeting.clone(),
            ..(*state).clone()
        }),
        Action::SetCurrentMeeting(current) => Arc::new(MeetingsState {
            current_meeting: current.clone(),
            ..(*state).clone()
        }),
        Action::ResetMeeting => Arc::new(MeetingsState {
            filtered_meetings: state.filtered_meetings.clone(),
            ..MeetingsState::default()
        }),
        Action::SetUserLocation(_) | Action::SetPromiseAmount(_) => state,
    }
}
