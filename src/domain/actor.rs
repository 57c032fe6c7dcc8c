//! Who is asking for a change
//!
//! Identity is established upstream; the booking engine only needs the
//! user id and whether the caller is an administrator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(String),
    Admin(String),
    /// Background processes such as the expiration sweep
    System,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        match role {
            Role::User => Self::User(user_id.into()),
            Role::Admin => Self::Admin(user_id.into()),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) | Self::Admin(id) => Some(id),
            Self::System => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }

    pub fn owns(&self, owner_id: &str) -> bool {
        self.user_id() == Some(owner_id)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::User(id) => format!("user {}", id),
            Self::Admin(id) => format!("admin {}", id),
            Self::System => "system".to_string(),
        }
    }
}
