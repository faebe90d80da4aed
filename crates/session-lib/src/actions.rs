//! Actions dispatched into the [`Store`](crate::store::Store).
use ricecoco_common::{CurrentMeeting, Location, Meeting, MeetingSummary};

/// Every action the store understands. Each reducer handles its own subset
/// and returns its slice untouched for the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the candidate list shown on the main map
    SetMeetings(Vec<MeetingSummary>),
    /// Replace the selected meeting
    SetSelectedMeeting(Meeting),
    /// Replace the live meeting snapshot pushed by the session service
    SetCurrentMeeting(CurrentMeeting),
    /// Forget the selected and current meeting
    ResetMeeting,
    /// Latest device location
    SetUserLocation(Location),
    /// Overwrite the user's promise count
    SetPromiseAmount(i32),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetMeetings(_) => "SET_MEETINGS",
            Action::SetSelectedMeeting(_) => "SET_SELECTED_MEETING",
            Action::SetCurrentMeeting(_) => "SET_CURRENT_MEETING",
            Action::ResetMeeting => "RESET_MEETING",
            Action::SetUserLocation(_) => "SET_USER_LOCATION",
            Action::SetPromiseAmount(_) => "SET_PROMISE_AMOUNT",
        }
    }
}
