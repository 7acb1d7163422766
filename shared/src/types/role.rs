use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Admin account roles, from most to least privileged.
///
/// Stored as text in the users table (`super_admin` / `admin` / `editor`)
/// and serialized the same way on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
}

impl Role {
    /// Text form as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Editor => "editor",
        }
    }

    /// Parse the stored text form.
    ///
    /// Unknown values degrade to `Editor` so a corrupted or hand-edited row
    /// can never grant elevated access.
    pub fn parse(s: &str) -> Role {
        match s {
            "super_admin" => Role::SuperAdmin,
            "admin" => Role::Admin,
            "editor" => Role::Editor,
            other => {
                warn!("Unknown role '{}' in user record, treating as editor", other);
                Role::Editor
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Role::SuperAdmin => 2,
            Role::Admin => 1,
            Role::Editor => 0,
        }
    }

    /// True when this role carries at least the privileges of `other`.
    pub fn at_least(&self, other: Role) -> bool {
        self.rank() >= other.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
