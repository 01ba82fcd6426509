//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a user holds inside one tenant, as stored on the membership row.
///
/// Roles are free text in the store; `ADMIN` and `MEMBER` are the ones the
/// routes gate on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Role(String);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const MEMBER: &'static str = "member";

    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        Self(role)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
