//! Screen navigation and blocking alerts.
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    MainMap,
    MatchSuccess,
    ChatRoom,
    AfterMeeting,
}

/// Destination plus whatever context the next screen needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub screen: Screen,
    pub meeting_id: Option<String>,
}

impl Route {
    pub fn to(screen: Screen) -> Self {
        Self {
            screen,
            meeting_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    /// Push a route on top of the stack
    Navigate(Route),
    /// Replace the top entry
    Replace(Screen),
    /// Keep the first `index` entries and put `screen` on top of them
    Reset { index: usize, screen: Screen },
}

pub trait Navigator: Send + Sync {
    fn dispatch(&self, action: NavAction);
}

/// In-memory navigation stack
#[derive(Debug)]
pub struct NavigationStack {
    stack: Mutex<Vec<Route>>,
    history: Mutex<Vec<NavAction>>,
}

impl NavigationStack {
    pub fn new(initial: Screen) -> Self {
        Self {
            stack: Mutex::new(vec![Route::to(initial)]),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> Option<Screen> {
        self.stack.lock().last().map(|route| route.screen)
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// Every action dispatched so far, oldest first
    pub fn history(&self) -> Vec<NavAction> {
        self.history.lock().clone()
    }
}

impl Navigator for NavigationStack {
    fn dispatch(&self, action: NavAction) {
        info!(?action, "Navigation");
        let mut stack = self.stack.lock();
        match &action {
            NavAction::Navigate(route) => stack.push(route.clone()),
            NavAction::Replace(screen) => {
                stack.pop();
                stack.push(Route::to(*screen));
            },
            NavAction::Reset { index, screen } => {
                stack.truncate(*index);
                stack.push(Route::to(*screen));
            },
        }
        self.history.lock().push(action);
    }
}

/// A non-cancelable confirmation with a single acknowledge button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub ok_label: String,
}

impl Alert {
    /// Shown when the partner gives up on the meeting
    pub fn cancelled_by_partner() -> Self {
        Self {
            title: "Time out".to_string(),
            message: "Your partner cancelled the meeting.".to_string(),
            ok_label: "OK".to_string(),
        }
    }
}

#[async_trait]
pub trait Alerts: Send + Sync {
    /// Show `alert` and resolve once the user acknowledged it
    async fn confirm(&self, alert: Alert);
}

/// Logs the alert and acknowledges it straight away
pub struct LogAlerts;

#[async_trait]
impl Alerts for LogAlerts {
    async fn confirm(&self, alert: Alert) {
        info!(title = %alert.title, message = %alert.message, "Alert acknowledged");
    }
}
