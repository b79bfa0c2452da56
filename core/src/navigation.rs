//! Forced return to the login entry point.
//!
//! When the server rejects the session, the client asks a `Navigator` to
//! take the application back to `LOGIN_ROUTE`. The shell owns what that
//! means (typically a full remount that discards all in-memory state);
//! `EventNavigator` turns the request into a `SessionEvent` it can listen
//! for.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, info};

/// Route of the login screen.
pub const LOGIN_ROUTE: &str = "/login";

/// Receives the request to abandon the current view and show login.
///
/// Called once per rejected request, so concurrent failures may call it
/// several times in a row. Implementations must treat repeats as no-ops.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session was rejected; the shell should remount at `route`.
    Expired { route: &'static str },
}

/// Publishes redirect requests on a broadcast channel.
///
/// A redirect stays pending until the shell calls `acknowledge`, and
/// redirects requested in the meantime are dropped.
#[derive(Debug)]
pub struct EventNavigator {
    tx: broadcast::Sender<SessionEvent>,
    pending: AtomicBool,
}

impl EventNavigator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            pending: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Mark the pending redirect as handled.
    pub fn acknowledge(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

impl Default for EventNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for EventNavigator {
    fn redirect_to_login(&self) {
        if self.pending.swap(true, Ordering::AcqRel) {
            debug!("redirect to login already pending");
            return;
        }
        info!(route = LOGIN_ROUTE, "redirecting to login");
        // No subscribers just means no shell is mounted yet.
        let _ = self.tx.send(SessionEvent::Expired { route: LOGIN_ROUTE });
    }
}
