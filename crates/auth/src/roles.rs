//! Role model.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role label granted within the active tenant.
///
/// Roles are intentionally opaque strings at this layer; the only role
/// semantics the engine understands is the admin superuser convention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this role label marks a superuser.
    ///
    /// Convention carried over from the console backend: any role whose
    /// label contains `ADMIN` (case-insensitive) is a superuser, e.g.
    /// `TENANT_ADMIN`, `admin`, `SuperAdmin`.
    pub fn is_admin(&self) -> bool {
        self.0.to_uppercase().contains("ADMIN")
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether any role in the sequence signals admin.
pub fn has_admin_role(roles: &[Role]) -> bool {
    roles.iter().any(Role::is_admin)
}
