//! Application route table.

use std::fmt;
use std::str::FromStr;

use crate::models::Role;

/// Top-level views of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    PasswordRecovery,
    Admin,
    Supervisor,
    Operator,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Login,
        Route::PasswordRecovery,
        Route::Admin,
        Route::Supervisor,
        Route::Operator,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/",
            Route::PasswordRecovery => "/password-recovery",
            Route::Admin => "/admin",
            Route::Supervisor => "/supervisor",
            Route::Operator => "/operator",
        }
    }

    /// Roles allowed into the view. Public views return an empty slice.
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Route::Login | Route::PasswordRecovery => &[],
            Route::Admin => &[Role::Administrador],
            Route::Supervisor => &[Role::Supervisor],
            Route::Operator => &[Role::Operador],
        }
    }

    pub fn is_protected(&self) -> bool {
        !self.required_roles().is_empty()
    }

    /// Landing view after a successful login.
    pub fn home_for(role: Role) -> Route {
        match role {
            Role::Administrador => Route::Admin,
            Role::Supervisor => Route::Supervisor,
            Role::Operador => Route::Operator,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = String;

    /// Accepts either the path (`/admin`) or the bare name (`admin`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('/');
        Route::ALL
            .into_iter()
            .find(|route| route.path().trim_start_matches('/') == wanted)
            .or(if wanted == "login" { Some(Route::Login) } else { None })
            .ok_or_else(|| format!("unknown route: {}", s))
    }
}
