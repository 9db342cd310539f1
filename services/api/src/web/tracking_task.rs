//! services/api/src/web/tracking_task.rs
//!
//! The asynchronous "worker" that advances a tracked session once per tick.

use crate::web::protocol::ServerMessage;
use crate::web::state::Outbox;
use drive_track_core::{SessionTimer, SpeedSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Ticks the timer every `period` until cancelled or until the timer leaves
/// the Tracking state.
///
/// Each tick is one locked update. A late tick is delayed, never doubled up.
pub async fn tracking_process<S>(
    timer: Arc<Mutex<SessionTimer>>,
    mut speed: S,
    outbox: Outbox,
    period: Duration,
    cancellation_token: CancellationToken,
) where
    S: SpeedSource + Send,
{
    info!("Tracking process started.");
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Tracking process cancelled.");
                return;
            }
            _ = interval.tick() => {}
        }

        let snapshot = {
            let mut timer = timer.lock().await;
            // Stop takes this lock before cancelling; re-check under it.
            if cancellation_token.is_cancelled() {
                return;
            }
            timer.tick(&mut speed)
        };

        match snapshot {
            Some(snapshot) => {
                debug!("Tick at {}s", snapshot.elapsed_seconds);
                if outbox.send(ServerMessage::Tick { snapshot }).is_err() {
                    info!("Client gone. Ending tracking process.");
                    return;
                }
            }
            None => {
                info!("Timer is no longer tracking. Ending tracking process.");
                return;
            }
        }
    }
}
