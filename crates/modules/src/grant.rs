//! Module grant and entitlement records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gestor_core::ModuleId;

/// A module entitlement attached to a session.
///
/// Created wholesale when a context payload is ingested; the session store
/// replaces the whole grant sequence atomically and never mutates a grant
/// in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleGrant {
    /// Canonical module key (see [`crate::normalize::canonical_key`]).
    pub key: String,

    pub enabled: bool,

    /// Grant-level expiry; absent means the grant does not lapse.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Presentation hints supplied by the tenant (may be overridden for
    /// system-reserved keys, see [`crate::presentation`]).
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl ModuleGrant {
    /// A grant with no expiry and no presentation hints.
    pub fn new(key: impl Into<String>, enabled: bool) -> Self {
        Self {
            key: key.into(),
            enabled,
            expires_at: None,
            route: None,
            icon: None,
            label: None,
        }
    }

    /// Whether the grant is usable at `now`: enabled and not lapsed.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.expires_at.is_none_or(|t| t > now)
    }
}

/// Raw module row from the tenant-wide listing (pre-normalization).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDto {
    pub id: ModuleId,
    pub name: String,
    /// Upstream status code; `1` means active.
    pub status: i32,
}

impl ModuleDto {
    pub const STATUS_ACTIVE: i32 = 1;

    pub fn is_active(&self) -> bool {
        self.status == Self::STATUS_ACTIVE
    }
}

/// One page of the upstream module listing.
///
/// Callers follow `page + 1` until `page + 1 >= total_pages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePage {
    pub content: Vec<ModuleDto>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl ModulePage {
    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}
