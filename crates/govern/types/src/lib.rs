//! Govern Types - shared vocabulary for the governance workspace
//!
//! Every other crate speaks in these types:
//! - `Account` and `LookupEntry` are the two governed entity kinds
//! - `Task` is a deferred intent waiting for an administrator
//! - `TaskPayload` is the typed, replayable body of a task
//! - `Actor` carries the identity and role of whoever is acting

#![deny(unsafe_code)]

mod account;
mod credential;
mod fields;
mod ids;
mod lookup;
mod role;
mod task;

pub use account::{Account, AccountChanges, AccountDraft, AccountPatch, NewAccount};
pub use credential::{Credential, SecretHash};
pub use fields::{FieldMap, PayloadError};
pub use ids::{AccountId, LookupEntryId, TaskId};
pub use lookup::{EntryStatus, LookupDraft, LookupEntry, LookupPatch, NewLookupEntry};
pub use role::{Actor, Role};
pub use task::{
    BulkUpload, EntityKind, NewTask, Resolution, Task, TaskPayload, TaskStatus, TaskType,
};
