// ============================
// ricecoco-session/src/lib.rs
// ============================
//! Client-side coordination of a live `RiceCoco` meeting: two matched users
//! heading to the same restaurant, reporting arrival, or breaking up.

pub mod actions;
pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod geo;
pub mod location;
pub mod meetings;
pub mod metrics;
pub mod navigation;
pub mod session;
pub mod store;

pub use error::{Result, SessionError};
pub use session::{spawn_session, EndReason, MeetingSession, Phase, SessionDeps, SessionHandle};
