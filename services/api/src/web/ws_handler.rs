//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a tracking WebSocket
//! connection. It owns the connection's timer and delegates ticking to the
//! tracking task.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, TrackingState},
    tracking_task::tracking_process,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::{Duration as ChronoDuration, Timelike, Utc};
use drive_track_core::{Account, SimulatedSpeed, Weather};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(account): Extension<Account>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, account))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, account: Account) {
    info!("New tracking connection established for account: {}", account.id);

    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();

    // --- 1. Forward outgoing messages to the socket ---
    let forwarder = tokio::spawn(async move {
        while let Some(msg) = inbox.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {:?}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                warn!("Failed to send message; client disconnected.");
                break;
            }
        }
    });

    // --- 2. Main Message Loop ---
    let mut tracking = TrackingState::new(account, outbox);
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(client_msg) => handle_client_message(&app_state, &mut tracking, client_msg).await,
                Err(e) => {
                    warn!("Failed to deserialize client message: {}", e);
                    tracking.send(ServerMessage::Error {
                        message: format!("Unrecognized message: {}", e),
                    });
                }
            },
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    // --- 3. Cleanup ---
    // An unsaved session is dropped with the connection.
    tracking.halt_ticks();
    drop(tracking);
    forwarder.abort();
    info!("Tracking connection closed.");
}

fn start_ticking(tracking: &mut TrackingState) {
    tracking.cancellation_token = CancellationToken::new();
    let task = {
        let timer = tracking.timer.clone();
        let outbox = tracking.outbox.clone();
        let period = tracking.tick_period;
        let token = tracking.cancellation_token.clone();
        tokio::spawn(async move {
            tracking_process(timer, SimulatedSpeed::new(), outbox, period, token).await;
        })
    };
    tracking.tick_handle = Some(task);
}

/// Widest offset any real time zone uses, UTC+14.
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Local wall-clock hour for a client at `utc_offset_minutes`, or `None` when
/// the offset is outside ±14h.
fn local_hour(utc_offset_minutes: Option<i32>) -> Option<u32> {
    let minutes = utc_offset_minutes.unwrap_or(0);
    if !(-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&minutes) {
        return None;
    }
    Some((Utc::now() + ChronoDuration::minutes(i64::from(minutes))).hour())
}

/// Applies one client command to the connection's timer.
pub async fn handle_client_message(
    app_state: &Arc<AppState>,
    tracking: &mut TrackingState,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Start { utc_offset_minutes } => {
            let Some(hour) = local_hour(utc_offset_minutes) else {
                tracking.send(ServerMessage::Rejected {
                    reason: format!(
                        "UTC offset must be within {} minutes of UTC",
                        MAX_UTC_OFFSET_MINUTES
                    ),
                });
                return;
            };
            let started = {
                let mut timer = tracking.timer.lock().await;
                timer
                    .start(hour)
                    .then(|| timer.time_of_day())
            };
            match started {
                Some(time_of_day) => {
                    info!("Tracking started for account {}", tracking.account.id);
                    start_ticking(tracking);
                    tracking.send(ServerMessage::TrackingStarted { time_of_day });
                }
                None => tracking.send(ServerMessage::Rejected {
                    reason: "A session is already in progress".to_string(),
                }),
            }
        }
        ClientMessage::Stop => {
            let stopped = {
                let mut timer = tracking.timer.lock().await;
                tracking.cancellation_token.cancel();
                timer.stop().then(|| timer.snapshot())
            };
            match stopped {
                Some(snapshot) => {
                    info!(
                        "Tracking stopped after {}s for account {}",
                        snapshot.elapsed_seconds, tracking.account.id
                    );
                    tracking.halt_ticks();
                    tracking.send(ServerMessage::Stopped { snapshot });
                }
                None => tracking.send(ServerMessage::Rejected {
                    reason: "Nothing is being tracked".to_string(),
                }),
            }
        }
        ClientMessage::Resume => {
            let resumed = tracking.timer.lock().await.resume();
            if resumed {
                info!("Tracking resumed for account {}", tracking.account.id);
                start_ticking(tracking);
                tracking.send(ServerMessage::Resumed);
            } else {
                tracking.send(ServerMessage::Rejected {
                    reason: "Only a stopped session can be resumed".to_string(),
                });
            }
        }
        ClientMessage::Discard => {
            let discarded = tracking.timer.lock().await.discard();
            if discarded {
                info!("Session discarded for account {}", tracking.account.id);
                tracking.send(ServerMessage::Discarded);
            } else {
                tracking.send(ServerMessage::Rejected {
                    reason: "Only a stopped session can be discarded".to_string(),
                });
            }
        }
        ClientMessage::Save { weather } => {
            save_session(app_state, tracking, weather.unwrap_or(Weather::Sunny)).await;
        }
    }
}

/// Two-phase save: the record is built under the lock, persisted without it,
/// and the timer only resets once the store accepted the record.
async fn save_session(app_state: &Arc<AppState>, tracking: &mut TrackingState, weather: Weather) {
    let finalized = tracking.timer.lock().await.finalize(weather, Utc::now());
    let session = match finalized {
        Ok(session) => session,
        Err(e) => {
            warn!("Save rejected for account {}: {}", tracking.account.id, e);
            tracking.send(ServerMessage::Rejected {
                reason: e.to_string(),
            });
            return;
        }
    };

    match app_state.db.add_session(tracking.account.id, &session).await {
        Ok(()) => {
            tracking.timer.lock().await.complete_save();
            info!(
                "Saved session {} ({}s) for account {}",
                session.id, session.duration, tracking.account.id
            );
            tracking.send(ServerMessage::Saved { session });
        }
        Err(e) => {
            error!("Failed to save session: {:?}", e);
            tracking.send(ServerMessage::Error {
                message: format!("Could not save the session, please retry: {}", e),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::WebSessionAuth;
    use crate::config::Config;
    use drive_track_core::memory::MemoryStore;
    use drive_track_core::ports::DatabaseService;
    use drive_track_core::{RoadType, SpeedSource, TimerState};
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    struct Steady(f64);

    impl SpeedSource for Steady {
        fn next_speed_mph(&mut self) -> f64 {
            self.0
        }
    }

    fn app() -> Arc<AppState> {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryStore::new());
        let config = Config::from_lookup(|key| match key {
            "STORAGE" => Some("memory".to_string()),
            _ => None,
        })
        .unwrap();
        Arc::new(AppState {
            auth: Arc::new(WebSessionAuth::new(db.clone(), 30)),
            db,
            config: Arc::new(config),
        })
    }

    fn connection() -> (TrackingState, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let account = Account {
            id: Uuid::new_v4(),
            email: "kim@example.com".to_string(),
        };
        let mut tracking = TrackingState::new(account, tx);
        // Keep the background ticker out of the way; tests tick by hand.
        tracking.tick_period = std::time::Duration::from_secs(3600);
        (tracking, rx)
    }

    #[tokio::test]
    async fn zero_length_session_is_rejected_and_kept() {
        let app = app();
        let (mut tracking, mut rx) = connection();

        handle_client_message(&app, &mut tracking, ClientMessage::Start { utc_offset_minutes: None }).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::TrackingStarted { .. })));

        handle_client_message(&app, &mut tracking, ClientMessage::Stop).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Stopped { .. })));

        handle_client_message(&app, &mut tracking, ClientMessage::Save { weather: None }).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Rejected { .. })));
        assert_eq!(tracking.timer.lock().await.state(), TimerState::Stopped);
        assert!(app.db.list_sessions(tracking.account.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_with_an_impossible_utc_offset_is_rejected() {
        let app = app();
        let (mut tracking, mut rx) = connection();

        for offset in [1_000_000, -(14 * 60) - 1, i32::MIN] {
            handle_client_message(&app, &mut tracking, ClientMessage::Start { utc_offset_minutes: Some(offset) }).await;
            assert!(matches!(rx.recv().await, Some(ServerMessage::Rejected { .. })));
            assert_eq!(tracking.timer.lock().await.state(), TimerState::Idle);
        }

        handle_client_message(&app, &mut tracking, ClientMessage::Start { utc_offset_minutes: Some(14 * 60) }).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::TrackingStarted { .. })));
    }

    #[tokio::test]
    async fn stopped_session_is_saved_with_its_road_types() {
        let app = app();
        let (mut tracking, mut rx) = connection();

        handle_client_message(&app, &mut tracking, ClientMessage::Start { utc_offset_minutes: Some(0) }).await;
        rx.recv().await;
        {
            let mut timer = tracking.timer.lock().await;
            for _ in 0..90 {
                timer.tick(&mut Steady(25.0));
            }
            for _ in 0..30 {
                timer.tick(&mut Steady(65.0));
            }
        }
        handle_client_message(&app, &mut tracking, ClientMessage::Stop).await;
        rx.recv().await;

        handle_client_message(
            &app,
            &mut tracking,
            ClientMessage::Save {
                weather: Some(Weather::Rainy),
            },
        )
        .await;
        let saved = match rx.recv().await {
            Some(ServerMessage::Saved { session }) => session,
            other => panic!("expected saved, got {:?}", other),
        };
        assert_eq!(saved.duration, 120);
        assert_eq!(saved.weather, Weather::Rainy);
        assert_eq!(
            saved.road_types.iter().copied().collect::<Vec<_>>(),
            vec![RoadType::Residential, RoadType::Highway]
        );
        assert_eq!(tracking.timer.lock().await.state(), TimerState::Idle);

        let stored = app.db.list_sessions(tracking.account.id).await.unwrap();
        assert_eq!(stored, vec![saved]);
    }

    #[tokio::test]
    async fn out_of_order_commands_are_rejected() {
        let app = app();
        let (mut tracking, mut rx) = connection();

        for msg in [ClientMessage::Stop, ClientMessage::Resume, ClientMessage::Discard] {
            handle_client_message(&app, &mut tracking, msg).await;
            assert!(matches!(rx.recv().await, Some(ServerMessage::Rejected { .. })));
        }

        handle_client_message(&app, &mut tracking, ClientMessage::Start { utc_offset_minutes: None }).await;
        rx.recv().await;
        handle_client_message(&app, &mut tracking, ClientMessage::Start { utc_offset_minutes: None }).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Rejected { .. })));
        assert_eq!(tracking.timer.lock().await.state(), TimerState::Tracking);
    }

    #[tokio::test]
    async fn discard_resets_and_resume_keeps_progress() {
        let app = app();
        let (mut tracking, mut rx) = connection();

        handle_client_message(&app, &mut tracking, ClientMessage::Start { utc_offset_minutes: None }).await;
        rx.recv().await;
        tracking.timer.lock().await.tick(&mut Steady(40.0));
        handle_client_message(&app, &mut tracking, ClientMessage::Stop).await;
        rx.recv().await;

        handle_client_message(&app, &mut tracking, ClientMessage::Resume).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Resumed)));
        assert_eq!(tracking.timer.lock().await.elapsed_seconds(), 1);

        handle_client_message(&app, &mut tracking, ClientMessage::Stop).await;
        rx.recv().await;
        handle_client_message(&app, &mut tracking, ClientMessage::Discard).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Discarded)));

        let timer = tracking.timer.lock().await;
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.elapsed_seconds(), 0);
        assert_eq!(timer.miles(), 0.0);
    }
}
