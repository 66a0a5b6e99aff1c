use crate::credential::{Credential, SecretHash};
use crate::fields::{
    check_keys, double_option, nullable_update, optional_text, required_text, FieldMap,
    PayloadError,
};
use crate::ids::AccountId;
use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persistent account record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub secret: SecretHash,
    pub role: Role,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for an account. Identity and timestamps are assigned by storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub secret: SecretHash,
    pub role: Role,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub created_by: Option<String>,
}

/// Column changes applied by the store. `Some(None)` clears a nullable column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountChanges {
    pub secret: Option<SecretHash>,
    pub role: Option<Role>,
    pub email: Option<Option<String>>,
    pub full_name: Option<Option<String>>,
    pub department: Option<Option<String>>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        self.secret.is_none()
            && self.role.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.department.is_none()
    }
}

/// Create payload for an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDraft {
    pub username: String,
    pub credential: Credential,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

const DRAFT_FIELDS: &[&str] = &[
    "username",
    "password",
    "password_hash",
    "role",
    "email",
    "full_name",
    "department",
];
const PROVENANCE_FIELDS: &[&str] = &["id", "created_by", "created_at", "updated_at"];

impl AccountDraft {
    /// Read a create payload. An existing `password_hash` wins over `password`.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, PayloadError> {
        check_keys(fields, DRAFT_FIELDS, PROVENANCE_FIELDS)?;

        let credential = match optional_text(fields, "password_hash")? {
            Some(hash) if !hash.is_empty() => Credential::Hashed(SecretHash::from_hashed(hash)),
            _ => Credential::Plain(required_text(fields, "password")?),
        };
        let role = required_text(fields, "role")?.parse::<Role>()?;

        Ok(Self {
            username: required_text(fields, "username")?,
            credential,
            role,
            email: optional_text(fields, "email")?,
            full_name: optional_text(fields, "full_name")?,
            department: optional_text(fields, "department")?,
        })
    }

    pub fn seal(self) -> Self {
        Self {
            credential: self.credential.seal(),
            ..self
        }
    }

    pub fn into_new_account(self, created_by: Option<String>) -> NewAccount {
        NewAccount {
            username: self.username,
            secret: self.credential.into_secret(),
            role: self.role,
            email: self.email,
            full_name: self.full_name,
            department: self.department,
            created_by,
        }
    }
}

/// Update payload for an account.
///
/// Identity (`username`) and provenance keys are ignored when read. A
/// `password` becomes the new secret once hashed; a literal `password_hash` is
/// never applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Credential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub email: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub full_name: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub department: Option<Option<String>>,
}

const PATCH_FIELDS: &[&str] = &["password", "role", "email", "full_name", "department"];
const PATCH_IGNORED: &[&str] = &[
    "id",
    "username",
    "password_hash",
    "created_by",
    "created_at",
    "updated_at",
];

impl AccountPatch {
    pub fn from_fields(fields: &FieldMap) -> Result<Self, PayloadError> {
        check_keys(fields, PATCH_FIELDS, PATCH_IGNORED)?;

        let password = match fields.get("password") {
            None | Some(serde_json::Value::Null) => None,
            Some(_) => Some(Credential::Plain(required_text(fields, "password")?)),
        };
        let role = match fields.get("role") {
            None => None,
            Some(_) => Some(required_text(fields, "role")?.parse::<Role>()?),
        };

        Ok(Self {
            password,
            role,
            email: nullable_update(fields, "email")?,
            full_name: nullable_update(fields, "full_name")?,
            department: nullable_update(fields, "department")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.role.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.department.is_none()
    }

    pub fn seal(self) -> Self {
        Self {
            password: self.password.map(Credential::seal),
            ..self
        }
    }

    pub fn into_changes(self) -> AccountChanges {
        AccountChanges {
            secret: self.password.map(Credential::into_secret),
            role: self.role,
            email: self.email,
            full_name: self.full_name,
            department: self.department,
        }
    }
}
