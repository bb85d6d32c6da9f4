use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Document permission level. Ordered: `Viewer < Editor < Owner`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Viewer,
    Editor,
    Owner,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Viewer => "viewer",
            PermissionLevel::Editor => "editor",
            PermissionLevel::Owner => "owner",
        }
    }

    /// True when this level grants at least `required`.
    pub fn satisfies(&self, required: PermissionLevel) -> bool {
        *self >= required
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Ok(PermissionLevel::Viewer),
            "editor" => Ok(PermissionLevel::Editor),
            "owner" => Ok(PermissionLevel::Owner),
            other => Err(format!("Unknown permission level '{}'", other)),
        }
    }
}

/// Result of a document permission check for a registered user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheck {
    pub has_access: bool,
    pub permission: Option<PermissionLevel>,
    pub is_owner: bool,
}

impl PermissionCheck {
    pub fn denied() -> Self {
        Self {
            has_access: false,
            permission: None,
            is_owner: false,
        }
    }

    /// Evaluate a user's effective level against the required one.
    pub fn evaluate(level: Option<PermissionLevel>, required: PermissionLevel) -> Self {
        Self {
            has_access: level.is_some_and(|l| l.satisfies(required)),
            permission: level,
            is_owner: level == Some(PermissionLevel::Owner),
        }
    }
}

/// Result of validating a share token for guest access.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuestAccess {
    pub has_access: bool,
    pub permission: Option<PermissionLevel>,
}

impl GuestAccess {
    pub fn denied() -> Self {
        Self {
            has_access: false,
            permission: None,
        }
    }

    /// Guests never exceed viewer access, whatever the share link says.
    pub fn viewer() -> Self {
        Self {
            has_access: true,
            permission: Some(PermissionLevel::Viewer),
        }
    }
}
