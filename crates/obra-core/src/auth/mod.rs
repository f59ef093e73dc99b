//! Client-side session lifecycle.
//!
//! This module provides:
//! - `SessionStore`: who is logged in, mirrored into durable storage
//! - `ExpirationScheduler`: pre-expiry warning, countdown and forced logout
//! - `SessionGate`: role-based access to protected views
//! - `SessionManager`: the single owner tying the three together and
//!   emitting `SessionEvent`s to subscribers
//!
//! Sessions last as long as the server says (`expiresIn`); the warning
//! appears 60 seconds before the end.

pub mod clock;
pub mod events;
pub mod gate;
pub mod manager;
pub mod scheduler;
pub mod session;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use events::{ChannelListener, EndReason, SessionEvent, SessionListener};
pub use gate::{GateDecision, SessionGate};
pub use manager::{ExpirationWarning, SessionManager};
pub use scheduler::{ExpirationScheduler, SchedulerConfig, SchedulerEvent, SchedulerPhase, Timer};
pub use session::{AuthState, DiscardReason, RestoreOutcome, SessionData, SessionStore};
