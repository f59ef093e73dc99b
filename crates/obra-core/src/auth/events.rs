use tokio::sync::mpsc;
use tracing::warn;

use crate::models::UserIdentity;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    UserLogout,
    Expired,
    RestoreFailed,
    /// A new login took over while the previous session was still active.
    Replaced,
}

/// Lifecycle notifications emitted by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { user: UserIdentity },
    Restored { user: UserIdentity },
    UserUpdated { user: UserIdentity },
    WarningShown { seconds_left: u32 },
    CountdownTick { seconds_left: u32 },
    WarningDismissed,
    /// Everything fetched for the previous identity is now stale.
    Ended { reason: EndReason },
}

impl SessionEvent {
    pub fn is_end(&self) -> bool {
        matches!(self, SessionEvent::Ended { .. })
    }
}

/// Subscriber to session lifecycle events.
pub trait SessionListener: Send + Sync {
    fn on_session_event(&self, event: &SessionEvent);
}

impl<F> SessionListener for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_session_event(&self, event: &SessionEvent) {
        self(event)
    }
}

/// Forwards events into an mpsc channel for async consumers.
pub struct ChannelListener {
    tx: mpsc::Sender<SessionEvent>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Listener plus the receiving half of a fresh channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

impl SessionListener for ChannelListener {
    fn on_session_event(&self, event: &SessionEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!(error = %e, "Dropped session event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_listener_forwards() {
        let (listener, mut rx) = ChannelListener::channel(4);
        listener.on_session_event(&SessionEvent::WarningDismissed);
        listener.on_session_event(&SessionEvent::Ended {
            reason: EndReason::Expired,
        });

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::WarningDismissed);
        let end = rx.try_recv().unwrap();
        assert!(end.is_end());
    }

    #[test]
    fn test_channel_listener_full_channel_does_not_panic() {
        let (listener, _rx) = ChannelListener::channel(1);
        listener.on_session_event(&SessionEvent::WarningDismissed);
        listener.on_session_event(&SessionEvent::WarningDismissed);
    }
}
