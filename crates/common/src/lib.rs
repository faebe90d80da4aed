// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between the `RiceCoco` client and its services.
//! This module defines the session-channel events, the REST payloads and
//! the meeting records they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier the session service uses to match an `Ack` to its request
pub type RequestId = Uuid;

/// A latitude/longitude pair in decimal degrees
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Full record of a matched meeting as returned by the meetings API
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Meeting {
    pub meeting_id: String,
    pub restaurant_id: String,
    pub restaurant_name: String,
    /// Unset until the details have been fetched
    pub restaurant_location: Option<Location>,
    pub partner_nickname: String,
    pub expired_time: Option<DateTime<Utc>>,
    pub arrival_count: u8,
}

/// Entry of the candidate list shown on the main map
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub meeting_id: String,
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub restaurant_location: Location,
    #[serde(default)]
    pub expired_time: Option<DateTime<Utc>>,
}

/// Live snapshot of a meeting pushed by the session service
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentMeeting {
    pub meeting_id: String,
    /// Number of participants that confirmed arrival so far
    pub arrival_count: u8,
}

impl CurrentMeeting {
    /// Both participants confirmed their arrival
    pub fn all_arrived(&self) -> bool {
        self.arrival_count >= 2
    }
}

/// Events sent from the client to the session service
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join the live session of a meeting
    /// # Fields
    /// * `meeting_id` - Meeting to join
    /// * `user_id` - Joining user
    #[serde(rename_all = "camelCase")]
    JoinMeeting { meeting_id: String, user_id: String },
    /// Share the latest device location with the partner
    SendLocation { location: Location },
    /// Report that this user confirmed arrival
    ArriveMeeting,
    /// Cancel the meeting (expired without both arrivals)
    #[serde(rename_all = "camelCase")]
    CancelMeeting { request_id: RequestId },
    /// Close the session normally
    #[serde(rename_all = "camelCase")]
    FinishMeeting { request_id: RequestId },
    /// Break the promise and leave the meeting
    #[serde(rename_all = "camelCase")]
    BreakupMeeting { request_id: RequestId },
}

impl ClientEvent {
    /// Request id of events that expect an acknowledgement
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            ClientEvent::CancelMeeting { request_id }
            | ClientEvent::FinishMeeting { request_id }
            | ClientEvent::BreakupMeeting { request_id } => Some(*request_id),
            _ => None,
        }
    }
}

/// Events sent from the session service to the client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    /// The shared meeting state changed (e.g. an arrival was counted)
    ChangeCurrentMeeting { meeting: CurrentMeeting },
    /// The partner moved
    GetPartnerLocation { location: Location },
    /// The partner cancelled the meeting
    CanceledByPartner,
    /// Acknowledgement of a cancel/finish/breakup request
    #[serde(rename_all = "camelCase")]
    Ack { request_id: RequestId },
}

/// Body of `GET /meetings/{id}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetailsResponse {
    pub meeting_details: Meeting,
}

/// Body of `PUT /users/{id}/promise`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromiseUpdate {
    /// `+1` for a kept promise, `-1` for a broken one
    pub amount: i32,
}
