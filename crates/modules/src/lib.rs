//! `gestor-modules` — module identity, grants, and presentation.
//!
//! Business modules arrive under heterogeneous names (mixed language,
//! accents, plural/singular). This crate canonicalizes them, attaches
//! navigation presentation, and models the grant/entitlement records the
//! session layer consumes.

pub mod grant;
pub mod normalize;
pub mod presentation;

pub use grant::{ModuleDto, ModuleGrant, ModulePage};
pub use normalize::{canonical_key, sanitize_key};
pub use presentation::{Presentation, resolve_presentation};
