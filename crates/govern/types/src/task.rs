use crate::account::{AccountDraft, AccountPatch};
use crate::credential::SecretHash;
use crate::fields::{FieldMap, PayloadError};
use crate::ids::TaskId;
use crate::lookup::{LookupDraft, LookupPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Create,
    Update,
    Delete,
    BulkUpload,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::Create,
        TaskType::Update,
        TaskType::Delete,
        TaskType::BulkUpload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Create => "create",
            TaskType::Update => "update",
            TaskType::Delete => "delete",
            TaskType::BulkUpload => "bulk_upload",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(TaskType::Create),
            "update" => Ok(TaskType::Update),
            "delete" => Ok(TaskType::Delete),
            "bulk_upload" => Ok(TaskType::BulkUpload),
            other => Err(PayloadError::Invalid(format!("unknown task type `{other}`"))),
        }
    }
}

/// The governed entity kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[serde(alias = "user")]
    Account,
    #[serde(alias = "reference_data")]
    LookupEntry,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::LookupEntry => "lookup_entry",
        }
    }

    /// Display label, e.g. `Lookup Entry`.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::LookupEntry => "Lookup Entry",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" | "user" => Ok(EntityKind::Account),
            "lookup_entry" | "reference_data" => Ok(EntityKind::LookupEntry),
            other => Err(PayloadError::Invalid(format!("unknown entity type `{other}`"))),
        }
    }
}

/// Task lifecycle: `Pending` is the only initial and only non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Approved,
        TaskStatus::Rejected,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "approved" => Ok(TaskStatus::Approved),
            "rejected" => Ok(TaskStatus::Rejected),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(PayloadError::InvalidStatus(s.to_string())),
        }
    }
}

/// Terminal status a pending task can be resolved into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Approved,
    Rejected,
    Failed,
}

impl From<Resolution> for TaskStatus {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Approved => TaskStatus::Approved,
            Resolution::Rejected => TaskStatus::Rejected,
            Resolution::Failed => TaskStatus::Failed,
        }
    }
}

/// Batch of upload rows, kept verbatim as parsed from the source file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulkUpload {
    pub source: String,
    pub record_count: usize,
    pub records: Vec<FieldMap>,
}

impl BulkUpload {
    pub fn new(source: impl Into<String>, records: Vec<FieldMap>) -> Self {
        Self {
            source: source.into(),
            record_count: records.len(),
            records,
        }
    }

    /// A batch is replayable when it carries at least one record.
    pub fn is_well_formed(&self) -> bool {
        !self.records.is_empty()
    }

    /// Replace plaintext `password` columns with `password_hash`.
    pub fn seal_passwords(mut self) -> Self {
        for record in &mut self.records {
            let has_hash = matches!(record.get("password_hash"), Some(Value::String(h)) if !h.is_empty());
            match record.remove("password") {
                Some(Value::String(password)) if !has_hash => {
                    record.insert(
                        "password_hash".to_string(),
                        Value::String(SecretHash::from_password(&password).as_str().to_string()),
                    );
                }
                Some(Value::Number(number)) if !has_hash => {
                    let hash = SecretHash::from_password(&number.to_string());
                    record.insert(
                        "password_hash".to_string(),
                        Value::String(hash.as_str().to_string()),
                    );
                }
                Some(other) if !has_hash => {
                    // Leave malformed values for replay to reject.
                    record.insert("password".to_string(), other);
                }
                _ => {}
            }
        }
        self
    }
}

/// Typed task body, one variant per `(task_type, entity_type)` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    CreateAccount(AccountDraft),
    CreateLookupEntry(LookupDraft),
    UpdateAccount(AccountPatch),
    UpdateLookupEntry(LookupPatch),
    DeleteAccount,
    DeleteLookupEntry,
    BulkAccounts(BulkUpload),
    BulkLookupEntries(BulkUpload),
    /// A stored body that no longer decodes. The task can still be listed and
    /// resolved; replaying it always fails.
    Unreadable {
        task_type: TaskType,
        entity_kind: EntityKind,
        raw: Value,
        reason: String,
    },
}

impl TaskPayload {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskPayload::CreateAccount(_) | TaskPayload::CreateLookupEntry(_) => TaskType::Create,
            TaskPayload::UpdateAccount(_) | TaskPayload::UpdateLookupEntry(_) => TaskType::Update,
            TaskPayload::DeleteAccount | TaskPayload::DeleteLookupEntry => TaskType::Delete,
            TaskPayload::BulkAccounts(_) | TaskPayload::BulkLookupEntries(_) => {
                TaskType::BulkUpload
            }
            TaskPayload::Unreadable { task_type, .. } => *task_type,
        }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            TaskPayload::CreateAccount(_)
            | TaskPayload::UpdateAccount(_)
            | TaskPayload::DeleteAccount
            | TaskPayload::BulkAccounts(_) => EntityKind::Account,
            TaskPayload::CreateLookupEntry(_)
            | TaskPayload::UpdateLookupEntry(_)
            | TaskPayload::DeleteLookupEntry
            | TaskPayload::BulkLookupEntries(_) => EntityKind::LookupEntry,
            TaskPayload::Unreadable { entity_kind, .. } => *entity_kind,
        }
    }

    /// Decode a stored body for a task of the given type.
    ///
    /// Bodies that do not decode (tag-less field mappings from older rows,
    /// hand-edited JSON) come back as `Unreadable` instead of failing the read.
    pub fn decode_stored(task_type: TaskType, entity_kind: EntityKind, raw: &str) -> Self {
        match serde_json::from_str::<TaskPayload>(raw) {
            Ok(payload) => payload,
            Err(err) => TaskPayload::Unreadable {
                task_type,
                entity_kind,
                raw: serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
                reason: err.to_string(),
            },
        }
    }

    pub fn is_readable(&self) -> bool {
        !matches!(self, TaskPayload::Unreadable { .. })
    }

    /// Whether the payload addresses an existing row.
    pub fn targets_existing(&self) -> bool {
        matches!(self.task_type(), TaskType::Update | TaskType::Delete)
    }

    /// Hash any plaintext credential carried by the payload.
    pub fn seal_credentials(self) -> Self {
        match self {
            TaskPayload::CreateAccount(draft) => TaskPayload::CreateAccount(draft.seal()),
            TaskPayload::UpdateAccount(patch) => TaskPayload::UpdateAccount(patch.seal()),
            TaskPayload::BulkAccounts(batch) => TaskPayload::BulkAccounts(batch.seal_passwords()),
            other => other,
        }
    }
}

/// Ledger insert shape. Id, status and timestamps are assigned by storage.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTask {
    pub entity_id: Option<i64>,
    pub payload: TaskPayload,
    pub created_by: String,
}

impl NewTask {
    pub fn new(entity_id: Option<i64>, payload: TaskPayload, created_by: impl Into<String>) -> Self {
        Self {
            entity_id,
            payload,
            created_by: created_by.into(),
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.payload.task_type()
    }

    pub fn entity_kind(&self) -> EntityKind {
        self.payload.entity_kind()
    }
}

/// Persistent task record.
///
/// `approved_by` and `approved_at` are set together, exactly when the task
/// leaves `Pending` (the names hold for rejections and failures as well).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    #[serde(rename = "entity_type")]
    pub entity_kind: EntityKind,
    pub entity_id: Option<i64>,
    pub payload: TaskPayload,
    pub status: TaskStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_detail: Option<String>,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// One-line operator description, e.g. `Delete Lookup Entry (ID: 5)`.
    pub fn describe(&self) -> String {
        let entity = self.entity_kind.label();
        match (&self.payload, self.entity_id) {
            (TaskPayload::BulkAccounts(batch) | TaskPayload::BulkLookupEntries(batch), _) => {
                format!(
                    "Bulk upload {entity} ({} records from {})",
                    batch.record_count, batch.source
                )
            }
            (_, Some(id)) => format!("{} {entity} (ID: {id})", action_label(self.task_type)),
            (_, None) => format!("{} {entity}", action_label(self.task_type)),
        }
    }
}

fn action_label(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Create => "Create new",
        TaskType::Update => "Update",
        TaskType::Delete => "Delete",
        TaskType::BulkUpload => "Bulk upload",
    }
}
