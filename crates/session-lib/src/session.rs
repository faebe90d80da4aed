// ============================
// ricecoco-session/src/session.rs
// ============================
//! Meeting session coordination.
//!
//! [`MeetingSession`] owns the local view of one live meeting: it joins the
//! session, follows the device location against the restaurant, reacts to
//! the partner's events and turns user actions into REST calls, session
//! signals and navigation. It runs as an actor; other components talk to it
//! through a [`SessionHandle`].
//!
//! The phase is an explicit state machine ([`Phase::apply`]) so combinations
//! such as "arrived while about to break up" cannot be represented.

use crate::actions::Action;
use crate::api::MeetingApi;
use crate::channel::{SessionChannel, SessionEvent, Subscription};
use crate::error::{Result, SessionError};
use crate::geo;
use crate::location::{LocationOptions, LocationSource};
use crate::metrics as keys;
use crate::navigation::{Alert, Alerts, NavAction, Navigator, Route, Screen};
use crate::store::Store;
use chrono::{DateTime, Utc};
use metrics::counter;
use ricecoco_common::Location;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Capacity of the command queue behind a [`SessionHandle`]
const COMMAND_QUEUE: usize = 16;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Time ran out with both participants arrived
    Completed,
    /// Time ran out without both arrivals
    Expired,
    CancelledByPartner,
    BrokenUp,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Completed => "completed",
            EndReason::Expired => "expired",
            EndReason::CancelledByPartner => "cancelled_by_partner",
            EndReason::BrokenUp => "broken_up",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Outside the arrival radius
    AwaitingArrival,
    /// Inside the arrival radius, not yet confirmed
    Arrived,
    /// Arrival confirmed; never revoked by later location changes
    ArrivalConfirmed,
    /// The user opened the break-up prompt while not arrived
    BreakupPending,
    Ended(EndReason),
}

/// Inputs of the phase transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Location { near: bool },
    ConfirmArrival,
    /// The promise increment failed and was rolled back
    ArrivalRejected,
    RequestBreakup,
    DismissBreakup,
    BrokeUp,
    PartnerCancelled,
    Expired { all_arrived: bool },
}

impl Phase {
    pub fn is_ended(&self) -> bool {
        matches!(self, Phase::Ended(_))
    }

    /// Next phase for `input`, or an error if the input is not valid here
    pub fn apply(self, input: Input) -> Result<Phase> {
        use Input as I;
        use Phase as P;

        let next = match (self, input) {
            (P::Ended(_), _) => None,

            (P::ArrivalConfirmed, I::Location { .. }) => Some(P::ArrivalConfirmed),
            (P::BreakupPending, I::Location { near: false }) => Some(P::BreakupPending),
            (_, I::Location { near: true }) => Some(P::Arrived),
            (_, I::Location { near: false }) => Some(P::AwaitingArrival),

            (P::Arrived | P::ArrivalConfirmed, I::ConfirmArrival) => Some(P::ArrivalConfirmed),
            (P::ArrivalConfirmed, I::ArrivalRejected) => Some(P::Arrived),

            (P::AwaitingArrival | P::BreakupPending, I::RequestBreakup) => Some(P::BreakupPending),
            (P::BreakupPending, I::DismissBreakup) => Some(P::AwaitingArrival),
            (P::BreakupPending, I::BrokeUp) => Some(P::Ended(EndReason::BrokenUp)),

            (_, I::PartnerCancelled) => Some(P::Ended(EndReason::CancelledByPartner)),
            (_, I::Expired { all_arrived: true }) => Some(P::Ended(EndReason::Completed)),
            (_, I::Expired { all_arrived: false }) => Some(P::Ended(EndReason::Expired)),

            _ => None,
        };

        next.ok_or_else(|| SessionError::InvalidTransition {
            action: input.name(),
            phase: format!("{self:?}"),
        })
    }
}

impl Input {
    fn name(&self) -> &'static str {
        match self {
            Input::Location { .. } => "location",
            Input::ConfirmArrival => "confirm_arrival",
            Input::ArrivalRejected => "arrival_rejected",
            Input::RequestBreakup => "request_breakup",
            Input::DismissBreakup => "dismiss_breakup",
            Input::BrokeUp => "broke_up",
            Input::PartnerCancelled => "partner_cancelled",
            Input::Expired { .. } => "expired",
        }
    }
}

/// What observers of a running session can see
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: Phase,
    pub partner_location: Option<Location>,
}

/// Actions the user can take on the session screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    ConfirmArrival,
    RequestBreakup,
    DismissBreakup,
    ConfirmBreakup,
    OpenChat,
}

/// Message sent *into* the session actor
#[derive(Debug)]
pub struct SessionCommand {
    pub action: UserAction,
    pub resp_tx: oneshot::Sender<Result<()>>,
}

/// Collaborators the session is wired to
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Store,
    pub api: Arc<dyn MeetingApi>,
    pub channel: Arc<dyn SessionChannel>,
    pub navigator: Arc<dyn Navigator>,
    pub alerts: Arc<dyn Alerts>,
}

/// Live pieces acquired on mount and released on unmount
pub struct Mounted {
    pub subscription: Subscription,
    pub samples: Option<mpsc::Receiver<Location>>,
}

pub struct MeetingSession {
    deps: SessionDeps,
    arrival_radius_m: f64,
    location_options: LocationOptions,
    phase: Phase,
    partner_location: Option<Location>,
    expiry: Option<(DateTime<Utc>, Instant)>,
    status_tx: watch::Sender<SessionStatus>,
}

impl MeetingSession {
    pub fn new(deps: SessionDeps, arrival_radius_m: f64, location_options: LocationOptions) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus {
            phase: Phase::AwaitingArrival,
            partner_location: None,
        });
        Self {
            deps,
            arrival_radius_m,
            location_options,
            phase: Phase::AwaitingArrival,
            partner_location: None,
            expiry: None,
            status_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn partner_location(&self) -> Option<Location> {
        self.partner_location
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    fn transition(&mut self, input: Input) -> Result<()> {
        let next = self.phase.apply(input)?;
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, "Phase change");
            self.phase = next;
            if let Phase::Ended(reason) = next {
                counter!(keys::SESSION_ENDED, "reason" => reason.as_str()).increment(1);
            }
        }
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.status_tx.send_replace(SessionStatus {
            phase: self.phase,
            partner_location: self.partner_location,
        });
    }

    fn ensure_live(&self, action: &'static str) -> Result<()> {
        if self.phase.is_ended() {
            return Err(SessionError::InvalidTransition {
                action,
                phase: format!("{:?}", self.phase),
            });
        }
        Ok(())
    }

    /// Subscribe, join, start location streaming and fetch the meeting.
    ///
    /// A failed detail fetch is logged and the session carries on with
    /// whatever selected meeting the store already holds.
    pub async fn mount(&mut self, location: &mut dyn LocationSource) -> Mounted {
        let user = self.deps.store.user();
        let meeting_id = self.deps.store.selected_meeting().meeting_id;

        // subscribe first so nothing sent right after the join is missed
        let subscription = self.deps.channel.subscribe();
        if let Err(e) = self.deps.channel.join_meeting(&meeting_id, &user.id).await {
            error!(error = %e, %meeting_id, "Failed to join meeting session");
        }

        let samples = match location.start(&self.location_options).await {
            Ok(rx) => Some(rx),
            Err(e) => {
                error!(error = %e, "Failed to start location updates");
                None
            },
        };

        match self.deps.api.fetch_meeting(&meeting_id).await {
            Ok(meeting) => self.deps.store.dispatch(Action::SetSelectedMeeting(meeting)),
            Err(e) => error!(error = %e, %meeting_id, "Failed to fetch meeting details"),
        }

        info!(%meeting_id, user_id = %user.id, "Meeting session mounted");
        Mounted {
            subscription,
            samples,
        }
    }

    /// Release the subscription, every listener and the location stream
    pub async fn unmount(&mut self, mounted: Mounted, location: &mut dyn LocationSource) {
        drop(mounted);
        self.deps.channel.remove_all_listeners();
        if let Err(e) = location.stop().await {
            warn!(error = %e, "Failed to stop location updates");
        }
        info!(phase = ?self.phase, "Meeting session unmounted");
    }

    /// New device location: recompute arrival and push it to the partner
    pub async fn on_location(&mut self, location: Location) {
        if self.phase.is_ended() {
            return;
        }
        self.deps.store.dispatch(Action::SetUserLocation(location));

        let near = self
            .deps
            .store
            .selected_meeting()
            .restaurant_location
            .is_some_and(|restaurant| geo::is_location_near(location, restaurant, self.arrival_radius_m));
        if let Err(e) = self.transition(Input::Location { near }) {
            warn!(error = %e, "Location ignored");
        }

        match self.deps.channel.send_location(location).await {
            Ok(()) => {
                counter!(keys::LOCATION_SENT).increment(1);
                debug!(?location, near, "Location sent");
            },
            Err(e) => warn!(error = %e, "Failed to send location"),
        }
    }

    /// Inbound partner event
    pub async fn on_event(&mut self, event: SessionEvent) {
        if self.phase.is_ended() {
            debug!(?event, "Event after session end ignored");
            return;
        }

        match event {
            SessionEvent::MeetingChanged(meeting) => {
                self.deps.store.dispatch(Action::SetCurrentMeeting(meeting));
            },
            SessionEvent::PartnerLocation(location) => {
                self.partner_location = Some(location);
                self.publish();
            },
            SessionEvent::CancelledByPartner => {
                info!("Meeting cancelled by partner");
                self.deps.alerts.confirm(Alert::cancelled_by_partner()).await;
                if let Err(e) = self.deps.channel.finish_meeting().await {
                    error!(error = %e, "Finish after partner cancellation was not acknowledged");
                }
                self.deps.store.dispatch(Action::ResetMeeting);
                self.deps.navigator.dispatch(NavAction::Replace(Screen::MainMap));
                if let Err(e) = self.transition(Input::PartnerCancelled) {
                    warn!(error = %e, "Partner cancellation ignored");
                }
            },
        }
    }

    /// The meeting's time ran out
    pub async fn on_expired(&mut self) {
        if self.phase.is_ended() {
            return;
        }
        let all_arrived = self.deps.store.current_meeting().all_arrived();
        info!(all_arrived, "Meeting time is over");

        if all_arrived {
            if let Err(e) = self.deps.channel.finish_meeting().await {
                error!(error = %e, "Finish was not acknowledged");
            }
            self.deps.navigator.dispatch(NavAction::Reset {
                index: 0,
                screen: Screen::AfterMeeting,
            });
        } else {
            if let Err(e) = self.deps.channel.cancel_meeting().await {
                error!(error = %e, "Cancel was not acknowledged");
            }
            self.deps.store.dispatch(Action::ResetMeeting);
            self.deps.navigator.dispatch(NavAction::Reset {
                index: 0,
                screen: Screen::MainMap,
            });
        }

        if let Err(e) = self.transition(Input::Expired { all_arrived }) {
            warn!(error = %e, "Expiry ignored");
        }
    }

    /// Confirm arrival once; repeated confirmations are no-ops.
    ///
    /// The promise count is bumped locally before the API call and rolled
    /// back if the call fails.
    pub async fn confirm_arrival(&mut self) -> Result<()> {
        if self.phase == Phase::ArrivalConfirmed {
            debug!("Arrival already confirmed");
            return Ok(());
        }
        self.transition(Input::ConfirmArrival)?;

        let user = self.deps.store.user();
        self.deps.store.dispatch(Action::SetPromiseAmount(user.promise.saturating_add(1)));

        if let Err(e) = self.deps.api.update_promise(&user.id, 1).await {
            error!(error = %e, "Promise increment failed, rolling back");
            self.deps.store.dispatch(Action::SetPromiseAmount(user.promise));
            counter!(keys::PROMISE_ROLLBACK).increment(1);
            self.transition(Input::ArrivalRejected)?;
            return Err(e);
        }

        counter!(keys::ARRIVAL_CONFIRMED).increment(1);
        info!("Arrival confirmed");
        self.deps.channel.arrive_meeting().await
    }

    /// Open the break-up prompt (only offered while not arrived)
    pub fn request_breakup(&mut self) -> Result<()> {
        self.transition(Input::RequestBreakup)
    }

    pub fn dismiss_breakup(&mut self) -> Result<()> {
        self.transition(Input::DismissBreakup)
    }

    /// Break the promise: decrement it remotely, then locally, then leave
    pub async fn confirm_breakup(&mut self) -> Result<()> {
        if self.phase != Phase::BreakupPending {
            return Err(SessionError::InvalidTransition {
                action: "confirm_breakup",
                phase: format!("{:?}", self.phase),
            });
        }

        let user = self.deps.store.user();
        if let Err(e) = self.deps.api.update_promise(&user.id, -1).await {
            error!(error = %e, "Promise decrement failed, staying in the meeting");
            return Err(e);
        }
        let promise = self.deps.store.user().promise;
        self.deps.store.dispatch(Action::SetPromiseAmount(promise.saturating_sub(1)));

        if let Err(e) = self.deps.channel.breakup_meeting().await {
            error!(error = %e, "Break-up was not acknowledged");
        }
        counter!(keys::BREAKUP).increment(1);
        info!("Meeting broken up");

        self.deps.store.dispatch(Action::ResetMeeting);
        self.deps.navigator.dispatch(NavAction::Replace(Screen::MainMap));
        self.transition(Input::BrokeUp)
    }

    pub fn open_chat(&mut self) -> Result<()> {
        self.ensure_live("open_chat")?;
        let meeting_id = self.deps.store.selected_meeting().meeting_id;
        self.deps.navigator.dispatch(NavAction::Navigate(Route {
            screen: Screen::ChatRoom,
            meeting_id: Some(meeting_id),
        }));
        Ok(())
    }

    pub async fn handle_action(&mut self, action: UserAction) -> Result<()> {
        match action {
            UserAction::ConfirmArrival => self.confirm_arrival().await,
            UserAction::RequestBreakup => self.request_breakup(),
            UserAction::DismissBreakup => self.dismiss_breakup(),
            UserAction::ConfirmBreakup => self.confirm_breakup().await,
            UserAction::OpenChat => self.open_chat(),
        }
    }

    /// Deadline derived from the selected meeting's expiry, if it has one
    fn expiry_deadline(&mut self) -> Option<Instant> {
        let expires_at = self.deps.store.selected_meeting().expired_time?;
        match self.expiry {
            Some((known, deadline)) if known == expires_at => Some(deadline),
            _ => {
                let remaining = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                let deadline = Instant::now() + remaining;
                self.expiry = Some((expires_at, deadline));
                Some(deadline)
            },
        }
    }

    /// Drive the session until it ends or every handle is dropped
    pub async fn run(
        mut self,
        mut location: Box<dyn LocationSource>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Option<EndReason> {
        let mut mounted = self.mount(location.as_mut()).await;

        let outcome = loop {
            if let Phase::Ended(reason) = self.phase {
                break Some(reason);
            }
            let deadline = self.expiry_deadline();

            tokio::select! {
                event = mounted.subscription.next() => match event {
                    Some(event) => self.on_event(event).await,
                    None => {
                        warn!("Session channel closed");
                        break None;
                    },
                },
                sample = next_sample(&mut mounted.samples) => match sample {
                    Some(location) => self.on_location(location).await,
                    None => {
                        warn!("Location stream ended");
                        mounted.samples = None;
                    },
                },
                command = commands.recv() => match command {
                    Some(SessionCommand { action, resp_tx }) => {
                        let result = self.handle_action(action).await;
                        match &result {
                            Err(e) if e.is_remote() => error!(?action, error = %e, "User action failed remotely"),
                            Err(e) => warn!(?action, error = %e, "User action rejected"),
                            Ok(()) => {},
                        }
                        let _ = resp_tx.send(result);
                    },
                    None => break None,
                },
                _ = sleep_until(deadline) => self.on_expired().await,
            }
        };

        self.unmount(mounted, location.as_mut()).await;
        outcome
    }
}

async fn next_sample(samples: &mut Option<mpsc::Receiver<Location>>) -> Option<Location> {
    match samples {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle that other components keep to drive a running session
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub async fn act(&self, action: UserAction) -> Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.cmd_tx.send(SessionCommand { action, resp_tx }).await?;
        resp_rx.await?
    }

    pub async fn confirm_arrival(&self) -> Result<()> {
        self.act(UserAction::ConfirmArrival).await
    }

    pub async fn request_breakup(&self) -> Result<()> {
        self.act(UserAction::RequestBreakup).await
    }

    pub async fn dismiss_breakup(&self) -> Result<()> {
        self.act(UserAction::DismissBreakup).await
    }

    pub async fn confirm_breakup(&self) -> Result<()> {
        self.act(UserAction::ConfirmBreakup).await
    }

    pub async fn open_chat(&self) -> Result<()> {
        self.act(UserAction::OpenChat).await
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Resolve once the session reached `Ended`, or `None` if it stopped first
    pub async fn ended(&self) -> Option<EndReason> {
        let mut status = self.status.clone();
        let seen = status.wait_for(|s| s.phase.is_ended()).await.ok()?;
        match seen.phase {
            Phase::Ended(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Spawn a session actor and return its handle
pub fn spawn_session(
    deps: SessionDeps,
    arrival_radius_m: f64,
    location_options: LocationOptions,
    location: Box<dyn LocationSource>,
) -> (SessionHandle, JoinHandle<Option<EndReason>>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
    let session = MeetingSession::new(deps, arrival_radius_m, location_options);
    let status = session.watch_status();

    let task = tokio::spawn(session.run(location, cmd_rx));
    (SessionHandle { cmd_tx, status }, task)
}
