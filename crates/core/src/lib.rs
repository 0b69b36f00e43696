//! `gestor-core` — foundation building blocks for the console.
//!
//! Pure primitives only (identifiers, error model); no IO, no transport.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{BranchId, ModuleId, TenantId, UserId};
