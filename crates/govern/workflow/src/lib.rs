//! Govern Workflow - role-gated mutations with deferred approval
//!
//! Administrators mutate accounts and lookup entries directly. Analysts cannot:
//! their mutations become pending tasks whose typed payload is replayed against
//! the entity store when an administrator approves them.
//!
//! ```text
//! submit ──policy──▶ execute now ──▶ entity store
//!           │
//!           └──────▶ pending task ──approve──▶ replay ──▶ approved | failed
//!                                  └─reject──▶ rejected
//! ```

#![deny(unsafe_code)]

mod engine;
mod error;
mod outcome;
mod replay;
mod reporting;
mod request;

pub use engine::WorkflowEngine;
pub use error::{ReplayFailure, WorkflowError, WorkflowResult};
pub use outcome::{BulkReport, Effect, ResolveOutcome, SubmitOutcome};
pub use reporting::Overview;
pub use request::{Decision, SubmitRequest};
