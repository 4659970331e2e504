//! Who is asking, and what they may do.
//!
//! The cache service never checks permissions itself. Callers build an
//! [`Actor`] and call [`Actor::require`] before entering it.

use std::fmt;
use std::str::FromStr;

use crate::errors::{LapsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    /// May read cached passwords.
    Viewer,
    /// May also force refreshes and clear cache entries.
    Operator,
    /// May also change the integration settings and manage the audit log.
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Refresh,
    Configure,
}

impl Capability {
    fn describe(self) -> &'static str {
        match self {
            Self::View => "view passwords",
            Self::Refresh => "refresh or clear cached passwords",
            Self::Configure => "change the LAPS configuration",
        }
    }
}

impl Role {
    pub fn grants(self, capability: Capability) -> bool {
        match capability {
            Capability::View => true,
            Capability::Refresh => self >= Role::Operator,
            Capability::Configure => self == Role::Admin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Operator => "operator",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LapsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "operator" => Ok(Self::Operator),
            "admin" => Ok(Self::Admin),
            other => Err(LapsError::CommandFailed(format!(
                "unknown role '{other}' — expected viewer, operator or admin"
            ))),
        }
    }
}

/// The identity recorded in audit entries, with its role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub identity: String,
    pub role: Role,
}

impl Actor {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.grants(capability)
    }

    /// `PermissionDenied` unless the role grants `capability`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(LapsError::PermissionDenied {
                actor: self.identity.clone(),
                action: capability.describe().to_string(),
            })
        }
    }
}
