//! Data models shared by the session subsystem.
//!
//! - `UserIdentity`: the role-bearing identity record returned by `/users/me`
//! - `Role`: the closed set of dashboard roles

pub mod user;

pub use user::{Role, UserIdentity};
