//! Auth context loading.
//!
//! Orchestrates the unified "who am I / what can I do" fetch and, when the
//! primary endpoint is unavailable, composes a context from the legacy
//! module listing so route guards keep functioning against old backends.
//! The two paths are a visible branch on the transport result, not a catch.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use gestor_core::{DomainError, DomainResult};
use gestor_modules::{ModuleDto, ModuleGrant};

use crate::store::{SessionStore, TenantProfile, UserProfile};
use crate::transport::{AuthTransport, TransportError};

/// Token material carried inside a context payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Unified context payload, as consumed from the context endpoint or
/// synthesized by the legacy fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthContext {
    pub user: Option<UserProfile>,
    pub tenant: Option<TenantProfile>,
    pub roles: Vec<String>,
    pub modules: Vec<ModuleGrant>,
    /// Raw module key → verbs; the store canonicalizes on ingest.
    pub permissions: HashMap<String, Vec<String>>,
    pub token: Option<TokenEnvelope>,
    pub server_time: Option<String>,
}

/// Decoded shape of a context response.
///
/// Backends answer in three shapes: the unified object, the same object
/// nested under `data`, or a bare module array (oldest deployments).
/// Precedence when decoding an object: `data` wrapper first, then the
/// object itself as a unified context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextPayload {
    Unified(AuthContext),
    Modules(Vec<ModuleDto>),
}

impl ContextPayload {
    pub fn decode(value: Value) -> DomainResult<Self> {
        match value {
            Value::Array(_) => serde_json::from_value(value)
                .map(ContextPayload::Modules)
                .map_err(|err| DomainError::validation(format!("module array payload: {err}"))),
            Value::Object(ref object) => {
                if let Some(inner) = object.get("data") {
                    return Self::decode(inner.clone());
                }
                serde_json::from_value(value)
                    .map(ContextPayload::Unified)
                    .map_err(|err| DomainError::validation(format!("unified context payload: {err}")))
            }
            other => Err(DomainError::validation(format!(
                "unsupported context payload shape: {other}"
            ))),
        }
    }
}

/// Fetches the auth context and writes it into the session store.
pub struct ContextLoader {
    transport: Arc<dyn AuthTransport>,
}

impl ContextLoader {
    pub fn new(transport: Arc<dyn AuthTransport>) -> Self {
        Self { transport }
    }

    /// Load the unified context, falling back to legacy composition when
    /// the primary endpoint is unavailable or answers garbage.
    ///
    /// On success (either path) the result has already been pushed into
    /// `store`.
    pub async fn load_context(&self, store: &SessionStore) -> Result<AuthContext, TransportError> {
        match self.transport.fetch_context().await {
            Ok(value) => match ContextPayload::decode(value) {
                Ok(ContextPayload::Unified(context)) => {
                    store.set_context(context.clone());
                    Ok(context)
                }
                Ok(ContextPayload::Modules(modules)) => {
                    let context = compose_from_modules(store, modules);
                    store.set_context(context.clone());
                    Ok(context)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "context payload undecodable, composing from legacy listing");
                    self.load_legacy(store).await
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "context endpoint unavailable, composing from legacy listing");
                self.load_legacy(store).await
            }
        }
    }

    /// Legacy path: walk the module listing and synthesize a context from
    /// the current store snapshot plus the fetched modules.
    async fn load_legacy(&self, store: &SessionStore) -> Result<AuthContext, TransportError> {
        let mut modules = Vec::new();
        let mut page = 0;
        loop {
            let batch = self.transport.fetch_modules_page(page).await?;
            modules.extend(batch.content.iter().cloned());
            if !batch.has_next() {
                break;
            }
            page += 1;
        }

        let context = compose_from_modules(store, modules);
        store.set_context(context.clone());
        Ok(context)
    }
}

/// Synthesize a context: identity, roles, token, and permissions survive
/// from the current session; modules come from the listing
/// (`enabled = status == 1`, no expiry, no custom route).
fn compose_from_modules(store: &SessionStore, modules: Vec<ModuleDto>) -> AuthContext {
    let snapshot = store.snapshot();

    AuthContext {
        user: snapshot.user,
        tenant: snapshot.tenant,
        roles: snapshot
            .roles
            .iter()
            .map(|role| role.as_str().to_string())
            .collect(),
        modules: modules
            .into_iter()
            .map(|dto| {
                let enabled = dto.is_active();
                ModuleGrant::new(dto.name, enabled)
            })
            .collect(),
        permissions: snapshot
            .permissions
            .into_iter()
            .map(|(key, verbs)| (key, verbs.into_iter().collect()))
            .collect(),
        token: snapshot.access_token.map(|access_token| TokenEnvelope {
            access_token,
            expires_at: snapshot.expires_at,
        }),
        server_time: snapshot.server_time,
    }
}
