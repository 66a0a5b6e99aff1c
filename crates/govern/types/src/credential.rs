use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hashed credential secret as stored on an account (hex-encoded SHA-256).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretHash(String);

impl SecretHash {
    /// Hash a plaintext password.
    pub fn from_password(password: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(password.as_bytes())))
    }

    /// Wrap a value that is already in hashed form.
    pub fn from_hashed(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, password: &str) -> bool {
        *self == Self::from_password(password)
    }
}

impl std::fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretHash(..)")
    }
}

/// Credential as carried in a task payload.
///
/// Payloads built by the workflow engine are sealed before they are persisted,
/// so `Plain` only survives in payloads that arrived from elsewhere.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    Hashed(SecretHash),
    Plain(String),
}

impl Credential {
    /// Resolve into the stored secret, hashing plaintext now.
    pub fn into_secret(self) -> SecretHash {
        match self {
            Credential::Hashed(hash) => hash,
            Credential::Plain(password) => SecretHash::from_password(&password),
        }
    }

    /// Replace plaintext with its hash.
    pub fn seal(self) -> Self {
        Credential::Hashed(self.into_secret())
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Credential::Hashed(_))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Hashed(_) => f.write_str("Credential::Hashed(..)"),
            Credential::Plain(_) => f.write_str("Credential::Plain(..)"),
        }
    }
}
