use crate::fields::PayloadError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Account role. Persisted under the names the admin tool has always used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "super_admin", alias = "administrator")]
    Administrator,
    #[serde(rename = "data_analyst", alias = "analyst")]
    Analyst,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Administrator, Role::Analyst];

    /// Storage name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "super_admin",
            Role::Analyst => "data_analyst",
        }
    }

    /// Parse a role from either its storage name or its plain name.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "super_admin" | "administrator" | "admin" => Some(Role::Administrator),
            "data_analyst" | "analyst" => Some(Role::Analyst),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| PayloadError::InvalidRole(s.to_string()))
    }
}

/// The identity performing an operation.
///
/// Passed explicitly into every submit/resolve call; nothing in the workspace
/// keeps a "current user" in ambient state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
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

    pub fn administrator(identity: impl Into<String>) -> Self {
        Self::new(identity, Role::Administrator)
    }

    pub fn analyst(identity: impl Into<String>) -> Self {
        Self::new(identity, Role::Analyst)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.identity, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_storage_and_plain_names() {
        assert_eq!(Role::parse("super_admin"), Some(Role::Administrator));
        assert_eq!(Role::parse(" Analyst "), Some(Role::Analyst));
        assert_eq!(Role::parse("auditor"), None);
        assert!("auditor".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_with_storage_names() {
        let json = serde_json::to_string(&Role::Analyst).unwrap();
        assert_eq!(json, "\"data_analyst\"");
        let parsed: Role = serde_json::from_str("\"administrator\"").unwrap();
        assert_eq!(parsed, Role::Administrator);
    }
}
