//! REST client for the dashboard's authentication backend.
//!
//! This module provides the `ApiClient` used by the login flow: the
//! credential exchange, the current-user lookup, and password recovery.
//! Everything else the dashboard fetches goes through the same bearer
//! token once a session exists.

pub mod client;
pub mod error;

pub use client::{ApiClient, Authenticated, LoginResponse};
pub use error::ApiError;
