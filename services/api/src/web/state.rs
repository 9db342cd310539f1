//! services/api/src/web/state.rs
//!
//! Defines the application's shared and tracking-connection states.

use crate::config::Config;
use crate::web::protocol::ServerMessage;
use drive_track_core::ports::{AuthProvider, DatabaseService};
use drive_track_core::{Account, SessionTimer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<Config>,
}

//=========================================================================================
// TrackingState (Specific to One WebSocket Connection)
//=========================================================================================

/// Outgoing messages for one connection. A forwarder task drains it into the socket.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// The state for a single tracking connection.
pub struct TrackingState {
    pub account: Account,
    pub timer: Arc<Mutex<SessionTimer>>,
    pub outbox: Outbox,
    pub tick_period: Duration,
    /// Cancels the current tick task.
    pub cancellation_token: CancellationToken,
    pub tick_handle: Option<JoinHandle<()>>,
}

impl TrackingState {
    pub fn new(account: Account, outbox: Outbox) -> Self {
        Self {
            account,
            timer: Arc::new(Mutex::new(SessionTimer::new())),
            outbox,
            tick_period: TICK_PERIOD,
            cancellation_token: CancellationToken::new(),
            tick_handle: None,
        }
    }

    /// Sends a message to the client. A closed outbox means the client is gone,
    /// which the receive loop notices on its own.
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.outbox.send(msg);
    }

    /// Cancels and aborts the tick task, if one is running.
    pub fn halt_ticks(&mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.tick_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TrackingState {
    fn drop(&mut self) {
        self.halt_ticks();
    }
}
