//! `gestor-auth` — token evaluation and permission policy (pure, no IO).
//!
//! This crate consumes opaque bearer tokens; it never issues or verifies
//! signatures. Decoding is claim-inspection only, for expiry decisions.

pub mod permissions;
pub mod roles;
pub mod token;

pub use permissions::{PermissionMatrix, resolve_permission};
pub use roles::{Role, has_admin_role};
pub use token::{BearerClaims, decode_claims, is_expired};
