use crate::fields::{
    check_keys, double_option, nullable_update, optional_text, required_text, required_update,
    FieldMap, PayloadError,
};
use crate::ids::LookupEntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Active,
    Inactive,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Active => "active",
            EntryStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(EntryStatus::Active),
            "inactive" => Ok(EntryStatus::Inactive),
            _ => Err(PayloadError::InvalidStatus(s.to_string())),
        }
    }
}

/// Persistent reference-data row. `(data_type, code)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: LookupEntryId,
    pub data_type: String,
    pub code: String,
    pub value: String,
    pub description: Option<String>,
    pub status: EntryStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLookupEntry {
    pub data_type: String,
    pub code: String,
    pub value: String,
    pub description: Option<String>,
    pub status: EntryStatus,
    pub created_by: Option<String>,
}

/// Create payload for a lookup entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupDraft {
    pub data_type: String,
    pub code: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: EntryStatus,
}

const DRAFT_FIELDS: &[&str] = &["data_type", "code", "value", "description", "status"];
const PROVENANCE_FIELDS: &[&str] = &["id", "created_by", "created_at", "updated_at"];

impl LookupDraft {
    pub fn from_fields(fields: &FieldMap) -> Result<Self, PayloadError> {
        check_keys(fields, DRAFT_FIELDS, PROVENANCE_FIELDS)?;

        let status = match optional_text(fields, "status")? {
            Some(raw) => raw.parse()?,
            None => EntryStatus::default(),
        };

        Ok(Self {
            data_type: required_text(fields, "data_type")?,
            code: required_text(fields, "code")?,
            value: required_text(fields, "value")?,
            description: optional_text(fields, "description")?,
            status,
        })
    }

    pub fn into_new_entry(self, created_by: Option<String>) -> NewLookupEntry {
        NewLookupEntry {
            data_type: self.data_type,
            code: self.code,
            value: self.value,
            description: self.description,
            status: self.status,
            created_by,
        }
    }
}

/// Update payload for a lookup entry.
///
/// `data_type` and `code` are immutable once created and are ignored here,
/// along with identity and provenance keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
}

const PATCH_FIELDS: &[&str] = &["value", "description", "status"];
const PATCH_IGNORED: &[&str] = &[
    "id",
    "data_type",
    "code",
    "created_by",
    "created_at",
    "updated_at",
];

impl LookupPatch {
    pub fn from_fields(fields: &FieldMap) -> Result<Self, PayloadError> {
        check_keys(fields, PATCH_FIELDS, PATCH_IGNORED)?;

        let status = required_update(fields, "status")?
            .map(|raw| raw.parse::<EntryStatus>())
            .transpose()?;

        Ok(Self {
            value: required_update(fields, "value")?,
            description: nullable_update(fields, "description")?,
            status,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.description.is_none() && self.status.is_none()
    }
}
