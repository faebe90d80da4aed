//! Device location streaming.
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use ricecoco_common::Location;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Name the background location task is registered under
pub const BACKGROUND_TASK: &str = "background-location-task";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    Lowest,
    Balanced,
    High,
    Highest,
}

/// What the session asks of the location provider
#[derive(Debug, Clone, PartialEq)]
pub struct LocationOptions {
    pub accuracy: Accuracy,
    /// Minimum time between samples
    pub time_interval: Duration,
    /// Minimum movement in meters between samples
    pub distance_interval_m: f64,
    pub shows_background_indicator: bool,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            accuracy: Accuracy::Highest,
            time_interval: Duration::from_millis(1000),
            distance_interval_m: 1.0,
            shows_background_indicator: true,
        }
    }
}

/// Source of continuous location samples
#[async_trait]
pub trait LocationSource: Send {
    /// Begin streaming; samples arrive on the returned receiver
    async fn start(&mut self, options: &LocationOptions) -> Result<mpsc::Receiver<Location>>;

    /// Stop streaming; the receiver handed out by `start` closes
    async fn stop(&mut self) -> Result<()>;
}

/// Plays back a recorded track, one sample per `time_interval`.
pub struct ReplayLocationSource {
    track: Vec<Location>,
    task: Option<JoinHandle<()>>,
}

impl ReplayLocationSource {
    pub fn new(track: Vec<Location>) -> Self {
        Self { track, task: None }
    }

    /// Read a JSON array of `{latitude, longitude}` points
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SessionError::Location(format!("{}: {e}", path.as_ref().display())))?;
        let track: Vec<Location> = serde_json::from_str(&raw)?;
        Ok(Self::new(track))
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[async_trait]
impl LocationSource for ReplayLocationSource {
    async fn start(&mut self, options: &LocationOptions) -> Result<mpsc::Receiver<Location>> {
        if self.task.is_some() {
            return Err(SessionError::Location(format!("{BACKGROUND_TASK} already running")));
        }

        let (tx, rx) = mpsc::channel(self.track.len().max(1));
        let track = self.track.clone();
        let interval = options.time_interval;
        info!(task = BACKGROUND_TASK, samples = track.len(), "Starting location replay");

        self.task = Some(tokio::spawn(async move {
            for (i, location) in track.into_iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(interval).await;
                }
                if tx.send(location).await.is_err() {
                    break;
                }
            }
            // keep the stream open until stopped, like a stationary device
            tx.closed().await;
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(task = BACKGROUND_TASK, "Stopped location replay");
        }
        Ok(())
    }
}
