//! Bearer-token sourcing and auth signals.

use tokio::sync::broadcast;

/// Response header marking a 401 as an expired (rather than missing or
/// invalid) token.
pub const TOKEN_EXPIRED_HEADER: &str = "token-expired";

/// Collaborator-supplied credential source, consulted on every outbound
/// request unless an explicit bearer override is set on the client.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Signals fired on 401 responses. Exactly one fires per 401: `TokenExpired`
/// when the marker header is present, `Unauthorized` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    TokenExpired,
    Unauthorized,
}

/// Broadcast publisher for auth signals. Subscribers that lag or drop their
/// receiver never block or fail the request path.
#[derive(Debug, Clone)]
pub(crate) struct AuthSignals {
    sender: broadcast::Sender<AuthEvent>,
}

impl AuthSignals {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn fire(&self, event: AuthEvent) {
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(event);
    }
}
