//! Session state holder.
//!
//! Single source of truth for the authenticated identity and its module
//! entitlements. The store is an explicit, constructible container — no
//! ambient singleton — handed by reference to loaders and guards. Every
//! mutation is a full-state replacement followed by a synchronous
//! write-through to [`SessionStorage`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use gestor_auth::{PermissionMatrix, Role, has_admin_role, is_expired, resolve_permission};
use gestor_core::{TenantId, UserId};
use gestor_modules::presentation::DEFAULT_ROUTE;
use gestor_modules::{ModuleGrant, canonical_key, resolve_presentation};

use crate::context::AuthContext;
use crate::guards::LOGIN_ROUTE;
use crate::storage::{STATE_KEY, SessionStorage, TOKEN_KEY};

/// Authenticated user descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub id: Option<UserId>,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    /// Ingest normalization: a blank or missing full name falls back to the
    /// username so display code never renders an empty identity.
    fn normalized(mut self) -> Self {
        let blank = self
            .full_name
            .as_deref()
            .is_none_or(|name| name.trim().is_empty());
        if blank {
            self.full_name = Some(self.username.clone());
        }
        self
    }
}

/// Active tenant descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantProfile {
    pub id: Option<TenantId>,
    pub name: String,
}

/// Full session state. Owned exclusively by [`SessionStore`]; mutated only
/// through its operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub access_token: Option<String>,
    /// Server-declared expiry hint. Informational: expiry decisions always
    /// consult the token's own claims.
    pub expires_at: Option<String>,
    pub user: Option<UserProfile>,
    pub tenant: Option<TenantProfile>,
    pub roles: Vec<Role>,
    pub modules: Vec<ModuleGrant>,
    pub permissions: PermissionMatrix,
    pub server_time: Option<String>,
}

/// The session store.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: RwLock<SessionState>,
    changes: watch::Sender<u64>,
    requested_redirect: Mutex<Option<String>>,
}

impl SessionStore {
    /// Construct the store, rehydrating any persisted session.
    ///
    /// The bare token slot is the source of truth: without it the state
    /// blob is not trusted; with it, a malformed blob degrades to an empty
    /// state carrying the rescued token.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let state = Self::rehydrate(storage.as_ref());
        let (changes, _) = watch::channel(0);
        Self {
            storage,
            state: RwLock::new(state),
            changes,
            requested_redirect: Mutex::new(None),
        }
    }

    fn rehydrate(storage: &dyn SessionStorage) -> SessionState {
        let Some(token) = storage.get(TOKEN_KEY) else {
            return SessionState::default();
        };

        let mut state = match storage.get(STATE_KEY) {
            Some(blob) => serde_json::from_str::<SessionState>(&blob).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "persisted session blob is malformed, keeping rescued token only");
                SessionState::default()
            }),
            None => SessionState::default(),
        };

        // The bare token wins if the blob disagrees.
        state.access_token = Some(token);
        state
    }

    // ── mutations ────────────────────────────────────────────────────────

    /// Replace the bearer token, preserving the rest of the state.
    pub fn set_token(&self, token: impl Into<String>, expires_at: Option<String>) {
        self.mutate(|state| {
            state.access_token = Some(token.into());
            state.expires_at = expires_at;
        });
    }

    /// Atomically replace identity, roles, modules, and permissions from a
    /// fetched context payload.
    ///
    /// The previously held token/expiry survive when the payload does not
    /// supply its own.
    pub fn set_context(&self, context: AuthContext) {
        self.mutate(|state| {
            let (access_token, expires_at) = match context.token {
                Some(envelope) => (Some(envelope.access_token), envelope.expires_at),
                None => (state.access_token.take(), state.expires_at.take()),
            };

            *state = SessionState {
                access_token,
                expires_at,
                user: context.user.map(UserProfile::normalized),
                tenant: context.tenant,
                roles: ingest_roles(context.roles),
                modules: ingest_grants(context.modules),
                permissions: ingest_permissions(context.permissions),
                server_time: context.server_time,
            };
        });
    }

    /// Reset to the empty initial state and erase persisted storage.
    ///
    /// Idempotent: tearing down an already-empty session is safe. With
    /// `redirect`, a navigation to the login route is requested (consumed
    /// via [`SessionStore::take_requested_redirect`]).
    pub fn clear_session(&self, redirect: bool) {
        self.mutate(|state| *state = SessionState::default());
        if redirect {
            if let Ok(mut slot) = self.requested_redirect.lock() {
                *slot = Some(LOGIN_ROUTE.to_string());
            }
        }
    }

    /// Take the navigation request recorded by [`SessionStore::clear_session`].
    pub fn take_requested_redirect(&self) -> Option<String> {
        self.requested_redirect.lock().ok().and_then(|mut s| s.take())
    }

    fn mutate(&self, f: impl FnOnce(&mut SessionState)) {
        {
            let mut state = match self.state.write() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut state);
            self.persist(&state);
        }
        self.changes.send_modify(|rev| *rev += 1);
    }

    /// Write-through: in-memory and persisted state must agree after every
    /// mutation. A state without a token is erased from storage instead of
    /// written, so storage never holds stale modules next to a null token.
    fn persist(&self, state: &SessionState) {
        match &state.access_token {
            Some(token) => match serde_json::to_string(state) {
                Ok(blob) => {
                    self.storage.set(TOKEN_KEY, token);
                    self.storage.set(STATE_KEY, &blob);
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to serialize session state");
                }
            },
            None => {
                self.storage.remove(TOKEN_KEY);
                self.storage.remove(STATE_KEY);
            }
        }
    }

    // ── queries ──────────────────────────────────────────────────────────

    /// Subscribe to state changes. The value is a revision counter; read
    /// the state through the store after each change notification.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Clone of the full current state (used by the legacy fallback
    /// composition).
    pub fn snapshot(&self) -> SessionState {
        self.read(|state| state.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(|state| state.access_token.clone())
    }

    /// Whether a context payload has been ingested (distinguishes "never
    /// fetched" from "fetched but empty").
    pub fn has_context_loaded(&self) -> bool {
        self.read(|state| state.user.is_some())
    }

    /// True when no token is held or the held token has lapsed.
    pub fn is_token_expired(&self) -> bool {
        self.is_token_expired_at(Utc::now())
    }

    pub fn is_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.read(|state| match &state.access_token {
            Some(token) => is_expired(token, now),
            None => true,
        })
    }

    /// Token present and not expired.
    pub fn is_authenticated(&self) -> bool {
        !self.is_token_expired()
    }

    /// Whether the session may perform `verb` on `module_key`.
    ///
    /// Admin roles short-circuit to granted; otherwise the key is
    /// canonicalized and the verb matched case-insensitively against the
    /// permission matrix.
    pub fn has_permission(&self, module_key: &str, verb: &str) -> bool {
        self.read(|state| {
            if has_admin_role(&state.roles) {
                return true;
            }
            let Some(key) = canonical_key(module_key) else {
                return false;
            };
            resolve_permission(&state.roles, &state.permissions, &key, verb)
        })
    }

    pub fn can_write(&self, module_key: &str) -> bool {
        self.has_permission(module_key, "write")
    }

    /// Read access; write implies read.
    pub fn can_read(&self, module_key: &str) -> bool {
        self.has_permission(module_key, "read") || self.can_write(module_key)
    }

    /// Grants that are enabled and unexpired right now.
    ///
    /// Evaluated against the wall clock at call time: an expiring module
    /// silently drops out of this view once its expiry passes, without a
    /// new fetch.
    pub fn active_modules(&self) -> Vec<ModuleGrant> {
        self.active_modules_at(Utc::now())
    }

    pub fn active_modules_at(&self, now: DateTime<Utc>) -> Vec<ModuleGrant> {
        self.read(|state| {
            state
                .modules
                .iter()
                .filter(|grant| grant.is_active(now))
                .cloned()
                .collect()
        })
    }

    /// Whether some active grant matches `key` (canonicalized).
    ///
    /// A blank key means "no restriction declared" and is permissive; a
    /// declared-but-unrecognized key canonicalizes to its sanitized
    /// identity and stays restrictive.
    pub fn has_enabled_module(&self, key: &str) -> bool {
        let Some(wanted) = canonical_key(key) else {
            return true;
        };
        let now = Utc::now();
        self.read(|state| {
            state
                .modules
                .iter()
                .filter(|grant| grant.is_active(now))
                .any(|grant| canonical_key(&grant.key).as_deref() == Some(wanted.as_str()))
        })
    }

    /// Navigation route of the first active module, or the default landing
    /// route when none are active.
    pub fn primary_route(&self) -> String {
        let now = Utc::now();
        self.read(|state| {
            state
                .modules
                .iter()
                .find(|grant| grant.is_active(now))
                .map(|grant| resolve_presentation(grant).route)
                .unwrap_or_else(|| DEFAULT_ROUTE.to_string())
        })
    }

    fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        let state = match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&state)
    }
}

fn ingest_roles(roles: Vec<String>) -> Vec<Role> {
    roles
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .map(Role::new)
        .collect()
}

/// Canonicalize grant keys on ingest; grants with blank keys are dropped.
fn ingest_grants(modules: Vec<ModuleGrant>) -> Vec<ModuleGrant> {
    modules
        .into_iter()
        .filter_map(|mut grant| {
            let key = canonical_key(&grant.key)?;
            grant.key = key;
            Some(grant)
        })
        .collect()
}

/// Canonicalize matrix keys, lowercase verbs.
fn ingest_permissions(
    permissions: std::collections::HashMap<String, Vec<String>>,
) -> PermissionMatrix {
    let mut matrix = PermissionMatrix::new();
    for (key, verbs) in permissions {
        let Some(key) = canonical_key(&key) else {
            continue;
        };
        let entry: &mut HashSet<String> = matrix.entry(key).or_default();
        entry.extend(verbs.into_iter().map(|verb| verb.to_lowercase()));
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TokenEnvelope;
    use crate::storage::MemoryStorage;
    use chrono::Duration;
    use std::collections::HashMap;

    fn store() -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone() as Arc<dyn SessionStorage>);
        (storage, store)
    }

    fn context(modules: Vec<ModuleGrant>) -> AuthContext {
        AuthContext {
            user: Some(UserProfile {
                username: "mgarcia".to_string(),
                ..UserProfile::default()
            }),
            tenant: Some(TenantProfile {
                id: None,
                name: "Acme SA".to_string(),
            }),
            roles: vec!["seller".to_string()],
            modules,
            permissions: HashMap::new(),
            token: Some(TokenEnvelope {
                access_token: "tok".to_string(),
                expires_at: None,
            }),
            server_time: None,
        }
    }

    #[test]
    fn blank_full_name_falls_back_to_username() {
        let (_, store) = store();
        let mut ctx = context(vec![]);
        ctx.user.as_mut().unwrap().full_name = Some("   ".to_string());
        store.set_context(ctx);

        let user = store.snapshot().user.unwrap();
        assert_eq!(user.full_name.as_deref(), Some("mgarcia"));
    }

    #[test]
    fn set_context_preserves_prior_token_when_payload_has_none() {
        let (_, store) = store();
        store.set_token("prior-token", Some("2030-01-01T00:00:00Z".to_string()));

        let mut ctx = context(vec![]);
        ctx.token = None;
        store.set_context(ctx);

        let state = store.snapshot();
        assert_eq!(state.access_token.as_deref(), Some("prior-token"));
        assert_eq!(state.expires_at.as_deref(), Some("2030-01-01T00:00:00Z"));
    }

    #[test]
    fn active_module_filtering_respects_expiry() {
        let (_, store) = store();
        let now = Utc::now();

        let mut fresh = ModuleGrant::new("Clientes", true);
        fresh.expires_at = Some(now + Duration::hours(1));
        let mut lapsed = ModuleGrant::new("Proveedores", true);
        lapsed.expires_at = Some(now - Duration::hours(1));

        store.set_context(context(vec![fresh, lapsed]));

        let active = store.active_modules_at(now);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].key, "CLIENT");
    }

    #[test]
    fn has_enabled_module_canonicalizes_and_blank_is_permissive() {
        let (_, store) = store();
        store.set_context(context(vec![ModuleGrant::new("Clientes", true)]));

        assert!(store.has_enabled_module("CLIENT"));
        assert!(store.has_enabled_module("customers"));
        assert!(!store.has_enabled_module("PROVIDER"));
        // No gate declared.
        assert!(store.has_enabled_module(""));
        assert!(store.has_enabled_module("   "));
    }

    #[test]
    fn admin_bypasses_empty_matrix() {
        let (_, store) = store();
        let mut ctx = context(vec![]);
        ctx.roles = vec!["TENANT_ADMIN".to_string()];
        store.set_context(ctx);

        assert!(store.has_permission("anything", "delete"));
    }

    #[test]
    fn write_implies_read() {
        let (_, store) = store();
        let mut ctx = context(vec![]);
        ctx.permissions
            .insert("CLIENT".to_string(), vec!["WRITE".to_string()]);
        store.set_context(ctx);

        assert!(store.can_write("CLIENT"));
        assert!(store.can_read("CLIENT"));
        assert!(!store.has_permission("CLIENT", "read"));
        assert!(!store.can_read("PROVIDER"));
    }

    #[test]
    fn persistence_round_trip() {
        let (storage, store) = store();
        let mut ctx = context(vec![ModuleGrant::new("Clientes", true)]);
        ctx.permissions
            .insert("Clientes".to_string(), vec!["read".to_string()]);
        store.set_context(ctx);
        let before = store.snapshot();
        drop(store);

        let revived = SessionStore::new(storage as Arc<dyn SessionStorage>);
        let after = revived.snapshot();
        assert_eq!(after.user, before.user);
        assert_eq!(after.modules, before.modules);
        assert_eq!(after.permissions, before.permissions);
    }

    #[test]
    fn malformed_blob_degrades_to_rescued_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "rescued");
        storage.set(STATE_KEY, "{ not json");

        let store = SessionStore::new(storage as Arc<dyn SessionStorage>);
        let state = store.snapshot();
        assert_eq!(state.access_token.as_deref(), Some("rescued"));
        assert!(state.user.is_none());
        assert!(state.modules.is_empty());
    }

    #[test]
    fn blob_without_bare_token_is_not_trusted() {
        let storage = Arc::new(MemoryStorage::new());
        let stale = SessionState {
            access_token: Some("stale".to_string()),
            ..SessionState::default()
        };
        storage.set(STATE_KEY, &serde_json::to_string(&stale).unwrap());

        let store = SessionStore::new(storage as Arc<dyn SessionStorage>);
        assert_eq!(store.snapshot(), SessionState::default());
    }

    #[test]
    fn bare_token_wins_over_blob_token() {
        let storage = Arc::new(MemoryStorage::new());
        let blob = SessionState {
            access_token: Some("blob-token".to_string()),
            ..SessionState::default()
        };
        storage.set(TOKEN_KEY, "bare-token");
        storage.set(STATE_KEY, &serde_json::to_string(&blob).unwrap());

        let store = SessionStore::new(storage as Arc<dyn SessionStorage>);
        assert_eq!(store.access_token().as_deref(), Some("bare-token"));
    }

    #[test]
    fn clear_session_is_idempotent_and_erases_storage() {
        let (storage, store) = store();
        store.set_context(context(vec![ModuleGrant::new("Clientes", true)]));
        assert!(storage.get(STATE_KEY).is_some());

        store.clear_session(true);
        assert_eq!(storage.get(TOKEN_KEY), None);
        assert_eq!(storage.get(STATE_KEY), None);
        assert_eq!(store.snapshot(), SessionState::default());
        assert_eq!(
            store.take_requested_redirect().as_deref(),
            Some(LOGIN_ROUTE)
        );

        // Second teardown is safe and requests nothing new.
        store.clear_session(false);
        assert_eq!(store.take_requested_redirect(), None);
    }

    #[test]
    fn primary_route_prefers_first_active_module() {
        let (_, store) = store();
        let mut disabled = ModuleGrant::new("Proveedores", false);
        disabled.route = Some("/providers".to_string());
        let active = ModuleGrant::new("Clientes", true);
        store.set_context(context(vec![disabled, active]));

        assert_eq!(store.primary_route(), "/clients");

        store.set_context(context(vec![]));
        assert_eq!(store.primary_route(), DEFAULT_ROUTE);
    }

    #[test]
    fn subscription_sees_every_mutation() {
        let (_, store) = store();
        let rx = store.subscribe();
        let start = *rx.borrow();

        store.set_token("t", None);
        store.set_context(context(vec![]));
        store.clear_session(false);

        assert_eq!(*rx.borrow(), start + 3);
    }

    #[test]
    fn missing_token_counts_as_expired() {
        let (_, store) = store();
        assert!(store.is_token_expired());
        assert!(!store.is_authenticated());
    }
}
