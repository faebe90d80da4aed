// ==============
// crates/session-lib/src/metrics.rs

//! Central place for metric keys
pub const LOCATION_SENT: &str = "session.location_sent";
pub const PEER_EVENT: &str = "session.peer_event";
pub const ARRIVAL_CONFIRMED: &str = "session.arrival_confirmed";
pub const BREAKUP: &str = "session.breakup";
pub const PROMISE_ROLLBACK: &str = "session.promise_rollback";
pub const SESSION_ENDED: &str = "session.ended";
