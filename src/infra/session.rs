use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::info;

const AUTH_EVENTS_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    Changed { authenticated: bool },
}

/// Bearer token shared by every request of one panel instance.
#[derive(Clone)]
pub struct SessionStore {
    token: Arc<RwLock<Option<String>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionStore {
    pub fn new(initial: Option<String>) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENTS_CAPACITY);
        Self {
            token: Arc::new(RwLock::new(initial)),
            events,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    pub fn set_token(&self, token: String) {
        *self.token.write() = Some(token);
        let _ = self.events.send(AuthEvent::Changed {
            authenticated: true,
        });
    }

    /// Explicit logout.
    pub fn clear(&self) {
        self.take_and_notify();
    }

    /// Called on HTTP 401. Only notifies when a token was actually dropped.
    pub fn invalidate(&self) -> bool {
        let dropped = self.take_and_notify();
        if dropped {
            info!("session token rejected by backend, cleared");
        }
        dropped
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn take_and_notify(&self) -> bool {
        let had_token = self.token.write().take().is_some();
        if had_token {
            let _ = self.events.send(AuthEvent::Changed {
                authenticated: false,
            });
        }
        had_token
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}
