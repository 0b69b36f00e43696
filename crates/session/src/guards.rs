//! Route guards.
//!
//! Each guard evaluates one navigation attempt and yields a
//! [`GuardDecision`]. Decisions are fail-closed: an identity problem
//! redirects to login, an authorization problem redirects to the welcome
//! page; no failure escapes to the router.

use std::sync::Arc;

use async_trait::async_trait;

use gestor_core::BranchId;
use gestor_modules::{canonical_key, sanitize_key};

use crate::context::ContextLoader;
use crate::entitlements::EntitlementCache;
use crate::store::SessionStore;

/// Login route for identity failures.
pub const LOGIN_ROUTE: &str = "/auth/login";

/// Landing route for authorization failures (and the default module route).
pub const WELCOME_ROUTE: &str = "/welcome";

/// Branch-selection screen for branch-scoped areas.
pub const BRANCH_SELECT_ROUTE: &str = "/branches/select";

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

impl GuardDecision {
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::Redirect(url.into())
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Protects the authenticated area.
pub struct AuthGuard {
    loader: ContextLoader,
}

impl AuthGuard {
    pub fn new(loader: ContextLoader) -> Self {
        Self { loader }
    }

    /// Evaluate a navigation into the authenticated area.
    ///
    /// Expired token → teardown + login redirect. Context already loaded →
    /// allow. Otherwise load it, failing closed to login.
    pub async fn check(&self, store: &SessionStore) -> GuardDecision {
        if store.is_token_expired() {
            tracing::debug!("auth guard: token missing or expired");
            store.clear_session(false);
            return GuardDecision::redirect(LOGIN_ROUTE);
        }

        if store.has_context_loaded() {
            return GuardDecision::Allow;
        }

        match self.loader.load_context(store).await {
            Ok(_) => GuardDecision::Allow,
            Err(err) => {
                tracing::warn!(error = %err, "auth guard: context load failed");
                store.clear_session(false);
                GuardDecision::redirect(LOGIN_ROUTE)
            }
        }
    }
}

/// Protects a feature area tagged with a required module key.
pub struct ModuleGuard {
    cache: Arc<EntitlementCache>,
}

impl ModuleGuard {
    pub fn new(cache: Arc<EntitlementCache>) -> Self {
        Self { cache }
    }

    /// Evaluate a navigation into a module-gated area.
    ///
    /// `None` means the route declares no module gate and is allowed. A
    /// declared key is canonicalized (sanitized identity for unknown
    /// spellings) and checked against the entitlement cache; anything that
    /// cannot be confirmed enabled — including a fetch failure, which
    /// yields an empty listing — redirects to the welcome page.
    pub async fn check(&self, required_module: Option<&str>) -> GuardDecision {
        let Some(raw) = required_module else {
            return GuardDecision::Allow;
        };

        let key = canonical_key(raw).unwrap_or_else(|| sanitize_key(raw));

        self.cache.load_once().await;
        if self.cache.has_enabled_module(&key).await {
            GuardDecision::Allow
        } else {
            tracing::debug!(module = %key, "module guard: not entitled");
            GuardDecision::redirect(WELCOME_ROUTE)
        }
    }
}

/// Collaborator holding the currently selected branch, if any.
#[async_trait]
pub trait BranchContext: Send + Sync {
    async fn active_branch(&self) -> Option<BranchId>;
}

/// Protects branch-scoped areas: a branch must be selected.
pub struct ActiveBranchGuard {
    branches: Arc<dyn BranchContext>,
}

impl ActiveBranchGuard {
    pub fn new(branches: Arc<dyn BranchContext>) -> Self {
        Self { branches }
    }

    pub async fn check(&self) -> GuardDecision {
        match self.branches.active_branch().await {
            Some(_) => GuardDecision::Allow,
            None => GuardDecision::redirect(BRANCH_SELECT_ROUTE),
        }
    }
}

/// Reactive counterpart of the auth guard: an HTTP interceptor that saw a
/// 401 calls this so discovered expiry behaves exactly like guard-detected
/// expiry.
pub fn on_unauthorized(store: &SessionStore) -> GuardDecision {
    store.clear_session(false);
    GuardDecision::redirect(LOGIN_ROUTE)
}
