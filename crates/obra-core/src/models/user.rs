use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Dashboard roles. Serialized exactly as the backend spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Administrador,
    Supervisor,
    Operador,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrador, Role::Supervisor, Role::Operador];

    /// Wire name of the role (`ADMINISTRADOR`, `SUPERVISOR`, `OPERADOR`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrador => "ADMINISTRADOR",
            Role::Supervisor => "SUPERVISOR",
            Role::Operador => "OPERADOR",
        }
    }

    /// Human readable label for terminal output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Administrador => "Administrator",
            Role::Supervisor => "Supervisor",
            Role::Operador => "Operator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Identity of the logged-in user as returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserIdentity {
    pub id: i64,
    #[serde(rename = "numberID")]
    pub number_id: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

impl UserIdentity {
    /// A record is usable for a session only when every text field is filled in.
    pub fn is_complete(&self) -> bool {
        !self.number_id.trim().is_empty()
            && !self.full_name.trim().is_empty()
            && !self.email.trim().is_empty()
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}
