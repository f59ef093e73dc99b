//! obra-core - session lifecycle for the obra construction dashboard.
//!
//! Administrators, supervisors and field operators share one dashboard
//! backed by a REST API. This crate keeps the client side of their session
//! honest: it persists the server-issued token, restores it on startup,
//! warns before it runs out, logs out when it does, gates views by role,
//! and evicts cached domain data whenever the session ends.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod routes;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthState, Clock, EndReason, GateDecision, SessionEvent, SessionGate, SessionListener,
    SessionManager, SystemClock,
};
pub use cache::{QueryCache, QueryKey};
pub use config::Config;
pub use models::{Role, UserIdentity};
pub use routes::Route;
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
