//! The single owner of session state.
//!
//! `SessionManager` ties the store, the expiration scheduler and the event
//! subscribers together. It is the only place that mutates the session;
//! everything else reads `AuthState` snapshots or listens for events.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::models::UserIdentity;
use crate::storage::Storage;

use super::clock::Clock;
use super::events::{EndReason, SessionEvent, SessionListener};
use super::scheduler::{ExpirationScheduler, SchedulerConfig, SchedulerEvent};
use super::session::{AuthState, RestoreOutcome, SessionData, SessionStore};

/// The expiration notice currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationWarning {
    pub seconds_left: u32,
}

impl ExpirationWarning {
    pub fn message(&self) -> String {
        format!(
            "Your session will expire in {} seconds. Save your work and log in again.",
            self.seconds_left
        )
    }
}

pub struct SessionManager<S, C> {
    store: SessionStore<S>,
    scheduler: ExpirationScheduler,
    clock: C,
    listeners: Vec<Arc<dyn SessionListener>>,
}

impl<S: Storage, C: Clock> SessionManager<S, C> {
    pub fn new(storage: S, clock: C) -> Self {
        Self::with_config(storage, clock, SchedulerConfig::default())
    }

    pub fn with_config(storage: S, clock: C, config: SchedulerConfig) -> Self {
        Self {
            store: SessionStore::new(storage),
            scheduler: ExpirationScheduler::new(config),
            clock,
            listeners: Vec::new(),
        }
    }

    /// Register a subscriber for lifecycle events.
    pub fn subscribe(&mut self, listener: Arc<dyn SessionListener>) {
        self.listeners.push(listener);
    }

    fn emit(&self, event: SessionEvent) {
        debug!(?event, listeners = self.listeners.len(), "Session event");
        for listener in &self.listeners {
            listener.on_session_event(&event);
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restore the persisted session at startup. Returns true when a valid
    /// session was found and its timers armed.
    pub fn restore(&mut self) -> bool {
        self.scheduler.disarm();
        let now = self.clock.now();

        match self.store.restore(now) {
            RestoreOutcome::Restored => {
                if let Some(data) = self.store.data() {
                    let (expires_at, user) = (data.expires_at, data.user.clone());
                    self.scheduler.arm(expires_at, now);
                    info!(user_id = user.id, role = %user.role, "Session restored");
                    self.emit(SessionEvent::Restored { user });
                }
                true
            }
            RestoreOutcome::NoSession => false,
            RestoreOutcome::Discarded(reason) => {
                info!(?reason, "Persisted session discarded");
                self.emit(SessionEvent::Ended {
                    reason: EndReason::RestoreFailed,
                });
                false
            }
        }
    }

    /// Start a session from a completed login exchange.
    ///
    /// Rejects an empty token, an incomplete user record or a non-positive
    /// lifetime, leaving the current state untouched. An active session is
    /// ended first so nothing cached for it carries over.
    pub fn login(&mut self, token: impl Into<String>, user: UserIdentity, expires_in: Duration) -> bool {
        let token = token.into();
        if token.trim().is_empty() {
            warn!("Refusing login with an empty token");
            return false;
        }
        if !user.is_complete() {
            warn!(user_id = user.id, "Refusing login with an incomplete user record");
            return false;
        }
        if expires_in <= Duration::zero() {
            warn!(expires_in_ms = expires_in.num_milliseconds(), "Refusing login with non-positive lifetime");
            return false;
        }

        if self.store.is_authenticated() {
            self.end_session(EndReason::Replaced);
        }

        let now = self.clock.now();
        let expires_at = now + expires_in;

        self.scheduler.disarm();
        self.store.set(SessionData {
            token,
            user: user.clone(),
            expires_at,
        });
        self.scheduler.arm(expires_at, now);

        info!(user_id = user.id, role = %user.role, %expires_at, "Logged in");
        self.emit(SessionEvent::Started { user });
        true
    }

    /// End the session. Safe to call with no session: storage is swept again
    /// but no event is emitted.
    pub fn logout(&mut self) {
        self.end_session(EndReason::UserLogout);
    }

    fn end_session(&mut self, reason: EndReason) {
        self.scheduler.disarm();
        let ended = self.store.clear();

        match ended {
            Some(data) => {
                info!(user_id = data.user.id, ?reason, "Session ended");
                self.emit(SessionEvent::Ended { reason });
            }
            None => debug!(?reason, "No active session to end"),
        }
    }

    /// Replace the user record after a profile edit. No-op without a live
    /// session.
    pub fn update_user(&mut self, user: UserIdentity) -> bool {
        if self.has_lapsed() {
            debug!("Ignoring user update on a lapsed session");
            return false;
        }
        if !self.store.update_user(user.clone()) {
            return false;
        }
        self.emit(SessionEvent::UserUpdated { user });
        true
    }

    /// Hide the expiration warning. The forced logout still happens at expiry.
    pub fn dismiss_warning(&mut self) -> bool {
        if !self.scheduler.dismiss_warning() {
            return false;
        }
        self.emit(SessionEvent::WarningDismissed);
        true
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Fire every timer due by now and return the resulting events.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();
        let mut expired = false;

        for fired in self.scheduler.fire_due(now) {
            match fired {
                SchedulerEvent::WarningShown { seconds_left } => {
                    events.push(SessionEvent::WarningShown { seconds_left });
                }
                SchedulerEvent::CountdownTick { seconds_left } => {
                    events.push(SessionEvent::CountdownTick { seconds_left });
                }
                SchedulerEvent::Expired => expired = true,
            }
        }

        // A session never outlives its deadline, whatever the timers say.
        if self.store.data().is_some_and(|d| d.is_expired_at(now)) {
            expired = true;
        }

        for event in &events {
            self.emit(event.clone());
        }

        if expired && self.store.is_authenticated() {
            self.end_session(EndReason::Expired);
            events.push(SessionEvent::Ended {
                reason: EndReason::Expired,
            });
        }

        events
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_deadline()
    }

    /// Sleep until the next timer deadline, then fire what is due.
    ///
    /// Pends forever when nothing is armed, so it is meant to sit in a
    /// `tokio::select!` next to other inputs.
    pub async fn wait_for_timers(&mut self) -> Vec<SessionEvent> {
        let Some(deadline) = self.next_deadline() else {
            return std::future::pending().await;
        };
        let delay = (deadline - self.clock.now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        tokio::time::sleep(delay).await;
        self.poll()
    }

    // =========================================================================
    // Read-only views
    // =========================================================================

    /// Snapshot for the gate and the views. A session past its deadline
    /// reads as absent even before the logout timer has been polled.
    pub fn state(&self) -> AuthState {
        if self.has_lapsed() {
            return AuthState {
                loading: self.store.is_loading(),
                ..AuthState::default()
            };
        }
        self.store.auth_state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated() && !self.has_lapsed()
    }

    fn has_lapsed(&self) -> bool {
        self.store
            .data()
            .is_some_and(|d| d.is_expired_at(self.clock.now()))
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.store.user()
    }

    pub fn token(&self) -> Option<&str> {
        self.store.token()
    }

    pub fn session(&self) -> Option<&SessionData> {
        self.store.data()
    }

    pub fn warning(&self) -> Option<ExpirationWarning> {
        self.scheduler.is_warning_visible().then(|| ExpirationWarning {
            seconds_left: self.scheduler.seconds_left(),
        })
    }

    pub fn scheduler(&self) -> &ExpirationScheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }
}
