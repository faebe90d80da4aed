use anyhow::Context;
use clap::Parser;
use ricecoco_common::Meeting;
use ricecoco_session::{
    actions::Action,
    api::HttpApi,
    channel::SocketClient,
    config::Settings,
    location::{LocationOptions, ReplayLocationSource},
    navigation::{LogAlerts, NavAction, NavigationStack, Navigator, Route, Screen},
    session::UserAction,
    spawn_session,
    store::{Store, UserState},
    SessionDeps,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Join a matched meeting and follow it until it ends
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to ./ricecoco.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    user_id: String,

    #[arg(long, default_value = "")]
    nickname: String,

    /// Promise count the user starts with
    #[arg(long, default_value_t = 0)]
    promise: i32,

    #[arg(long)]
    meeting_id: String,

    /// JSON array of `{latitude, longitude}` samples to replay as the device location
    #[arg(long)]
    track: PathBuf,

    /// Overrides the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_action(line: &str) -> Option<UserAction> {
    match line.trim() {
        "arrive" => Some(UserAction::ConfirmArrival),
        "breakup" => Some(UserAction::RequestBreakup),
        "no" => Some(UserAction::DismissBreakup),
        "yes" => Some(UserAction::ConfirmBreakup),
        "chat" => Some(UserAction::OpenChat),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;

    let level = cli.log_level.clone().unwrap_or_else(|| settings.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let store = Store::new(UserState {
        id: cli.user_id.clone(),
        nickname: cli.nickname.clone(),
        promise: cli.promise,
    });
    store.dispatch(Action::SetSelectedMeeting(Meeting {
        meeting_id: cli.meeting_id.clone(),
        ..Meeting::default()
    }));

    let api = HttpApi::from_settings(&settings)?;
    let channel = SocketClient::connect(&settings.socket_url, settings.ack_timeout())
        .await
        .with_context(|| format!("Failed to connect to {}", settings.socket_url))?;
    let navigator = Arc::new(NavigationStack::new(Screen::MainMap));
    navigator.dispatch(NavAction::Navigate(Route::to(Screen::MatchSuccess)));

    let deps = SessionDeps {
        store: store.clone(),
        api: Arc::new(api),
        channel: Arc::new(channel),
        navigator: navigator.clone(),
        alerts: Arc::new(LogAlerts),
    };
    let options = LocationOptions {
        time_interval: settings.location_interval(),
        ..LocationOptions::default()
    };
    let track = ReplayLocationSource::from_file(&cli.track)?;

    let (handle, task) = spawn_session(deps, settings.arrival_radius_m, options, Box::new(track));
    tracing::info!("Commands: arrive | breakup | yes | no | chat | status | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            reason = handle.ended() => {
                tracing::info!(?reason, "Session ended");
                break;
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "quit" => break,
                    "status" => {
                        let status = handle.status();
                        println!(
                            "phase={:?} partner={:?} promise={} screen={:?}",
                            status.phase,
                            status.partner_location,
                            store.user().promise,
                            navigator.current(),
                        );
                    },
                    other => match parse_action(other) {
                        Some(action) => {
                            if let Err(e) = handle.act(action).await {
                                eprintln!("{action:?} failed: {e}");
                            }
                        },
                        None => eprintln!("Unknown command: {other}"),
                    },
                }
            },
        }
    }

    drop(handle);
    let reason = task.await?;
    println!("ended: {reason:?}, screen: {:?}", navigator.current());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        assert_eq!(parse_action(" arrive\n"), Some(UserAction::ConfirmArrival));
        assert_eq!(parse_action("yes"), Some(UserAction::ConfirmBreakup));
        assert_eq!(parse_action("dance"), None);
    }

    #[test]
    fn test_cli_parses_required_args() {
        let cli = Cli::try_parse_from([
            "ricecoco-session",
            "--user-id",
            "u1",
            "--meeting-id",
            "m1",
            "--track",
            "track.json",
        ])
        .unwrap();
        assert_eq!(cli.user_id, "u1");
        assert_eq!(cli.promise, 0);
        assert!(cli.config.is_none());
    }
}
