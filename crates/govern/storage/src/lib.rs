//! Govern storage abstractions.
//!
//! This crate defines the storage contract for the governance workspace:
//! - accounts, unique by username
//! - lookup entries, unique by `(data_type, code)`
//! - the task ledger's rows, with a conditional pending-only resolution
//!
//! Design stance:
//! - Each write commits on its own; there are no multi-entity transactions.
//! - Uniqueness conflicts surface as `StorageError::Conflict`, never as a
//!   backend failure.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{
    AccountFilter, AccountStore, GovernanceStorage, LookupFilter, LookupStore, QueryWindow,
    TaskStore,
};
