use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::UserIdentity;
use crate::storage::Storage;

/// Storage key holding the raw bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the JSON-serialized `UserIdentity`
pub const USER_KEY: &str = "user";

/// Storage key holding the expiry instant as an epoch-millisecond string
pub const EXPIRES_AT_KEY: &str = "expiresAt";

/// Last selected option of the generic list views. Meaningless across
/// identities, so it is dropped together with the session.
pub const VIEW_PREFERENCE_KEY: &str = "genericViewSelectedOption";

const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, USER_KEY, EXPIRES_AT_KEY];

const SESSION_SCOPED_KEYS: [&str; 1] = [VIEW_PREFERENCE_KEY];

/// A complete session. Partial sessions cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionData {
    pub token: String,
    pub user: UserIdentity,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

/// Why a persisted session was thrown away during restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Some but not all of the session keys were present
    Partial,
    /// A key was present but could not be parsed
    Malformed,
    /// `expiresAt` is not in the future
    Expired,
    /// The storage backend could not be read
    StorageUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    NoSession,
    Discarded(DiscardReason),
}

/// Read-only view of the authentication state handed to the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthState {
    pub loading: bool,
    pub is_authenticated: bool,
    pub user: Option<UserIdentity>,
    pub token: Option<String>,
}

/// Holds who is logged in and mirrors it into durable storage.
///
/// Storage failures never escape: reads that fail count as "no session",
/// writes that fail are logged and the session carries on in memory.
pub struct SessionStore<S> {
    storage: S,
    data: Option<SessionData>,
    loading: bool,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            data: None,
            loading: true,
        }
    }

    /// Load the persisted session, discarding it unless it is complete,
    /// parseable and unexpired at `now`.
    pub fn restore(&mut self, now: DateTime<Utc>) -> RestoreOutcome {
        self.loading = false;
        self.data = None;

        match self.read_persisted() {
            Ok(None) => {
                debug!("No persisted session");
                self.clear_persisted();
                RestoreOutcome::NoSession
            }
            Ok(Some(data)) if data.is_expired_at(now) => {
                warn!(expires_at = %data.expires_at, "Persisted session has expired, discarding");
                self.clear_persisted();
                RestoreOutcome::Discarded(DiscardReason::Expired)
            }
            Ok(Some(data)) => {
                debug!(user_id = data.user.id, expires_at = %data.expires_at, "Session restored");
                self.data = Some(data);
                RestoreOutcome::Restored
            }
            Err(reason) => {
                warn!(?reason, "Persisted session is unusable, discarding");
                self.clear_persisted();
                RestoreOutcome::Discarded(reason)
            }
        }
    }

    fn read_persisted(&self) -> Result<Option<SessionData>, DiscardReason> {
        let mut values = Vec::with_capacity(SESSION_KEYS.len());
        for key in SESSION_KEYS {
            let value = self.storage.get_item(key).map_err(|e| {
                warn!(key, error = %e, "Failed to read session key");
                DiscardReason::StorageUnavailable
            })?;
            values.push(value.filter(|v| !v.is_empty()));
        }

        let (token, user, expires_at) = match (values[0].take(), values[1].take(), values[2].take()) {
            (None, None, None) => return Ok(None),
            (Some(token), Some(user), Some(expires_at)) => (token, user, expires_at),
            _ => return Err(DiscardReason::Partial),
        };

        let user: UserIdentity = serde_json::from_str(&user).map_err(|e| {
            warn!(error = %e, "Failed to parse persisted user");
            DiscardReason::Malformed
        })?;
        let expires_at = parse_epoch_millis(&expires_at).ok_or(DiscardReason::Malformed)?;

        Ok(Some(SessionData {
            token,
            user,
            expires_at,
        }))
    }

    /// Replace the current session and persist all three keys.
    pub fn set(&mut self, data: SessionData) {
        self.write_item(TOKEN_KEY, &data.token);
        match serde_json::to_string(&data.user) {
            Ok(json) => self.write_item(USER_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize user"),
        }
        self.write_item(EXPIRES_AT_KEY, &data.expires_at.timestamp_millis().to_string());
        self.loading = false;
        self.data = Some(data);
    }

    /// Swap the user record of the active session. Returns false (and does
    /// nothing) when no session is active.
    pub fn update_user(&mut self, user: UserIdentity) -> bool {
        let Some(data) = self.data.as_mut() else {
            debug!("update_user called without an active session");
            return false;
        };
        data.user = user;
        match serde_json::to_string(&data.user) {
            Ok(json) => self.write_item(USER_KEY, &json),
            Err(e) => warn!(error = %e, "Failed to serialize user"),
        }
        true
    }

    /// Drop the session from storage and memory. Returns the session that
    /// was active, if any.
    pub fn clear(&mut self) -> Option<SessionData> {
        self.clear_persisted();
        self.data.take()
    }

    fn clear_persisted(&mut self) {
        for key in SESSION_KEYS.into_iter().chain(SESSION_SCOPED_KEYS) {
            if let Err(e) = self.storage.remove_item(key) {
                warn!(key, error = %e, "Failed to remove session key");
            }
        }
    }

    fn write_item(&mut self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value) {
            warn!(key, error = %e, "Failed to persist session key, continuing in memory");
        }
    }

    pub fn data(&self) -> Option<&SessionData> {
        self.data.as_ref()
    }

    /// Get the bearer token if a session exists
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.data.as_ref().map(|d| &d.user)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.data.as_ref().map(|d| d.expires_at)
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            loading: self.loading,
            is_authenticated: self.is_authenticated(),
            user: self.user().cloned(),
            token: self.token().map(str::to_string),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

fn parse_epoch_millis(value: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = value.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
