//! Permission resolution policy.
//!
//! Pure policy check over a per-module verb matrix:
//! - No IO
//! - No panics
//! - No module-name normalization (callers pass canonical keys)

use std::collections::{HashMap, HashSet};

use crate::roles::{Role, has_admin_role};

/// Per-module permission matrix: canonical module key → granted verbs.
///
/// Verbs are stored lowercased (`read`, `write`, `delete`, ...); ingestion
/// is responsible for lowercasing, lookups lowercase the queried verb so
/// the membership test stays case-insensitive either way.
pub type PermissionMatrix = HashMap<String, HashSet<String>>;

/// Resolve whether the session may perform `verb` on the module identified
/// by `canonical_key`.
///
/// Admin roles short-circuit to granted; the matrix is never consulted for
/// a superuser.
pub fn resolve_permission(
    roles: &[Role],
    matrix: &PermissionMatrix,
    canonical_key: &str,
    verb: &str,
) -> bool {
    if has_admin_role(roles) {
        return true;
    }

    let verb = verb.to_lowercase();
    matrix
        .get(canonical_key)
        .is_some_and(|verbs| verbs.contains(&verb))
}
