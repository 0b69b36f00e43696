//! End-to-end guard scenarios: navigation attempts against a fake backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use gestor_core::ModuleId;
use gestor_modules::ModulePage;
use gestor_session::{
    AuthGuard, AuthTransport, ContextLoader, EntitlementCache, GuardDecision, MemoryStorage,
    ModuleGuard, STATE_KEY, SessionStorage, SessionStore, TOKEN_KEY, TransportError, guards,
    on_unauthorized,
};

/// Unsigned bearer token whose `exp` is `offset` from now.
fn token_expiring_in(offset: Duration) -> String {
    let exp = (Utc::now() + offset).timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": exp }).to_string().as_bytes());
    format!("{header}.{payload}.sig")
}

/// Fake backend with switchable context endpoint and module listing.
struct FakeBackend {
    context: Result<Value, TransportError>,
    listing: Result<Vec<Value>, TransportError>,
    listing_calls: AtomicU32,
}

impl FakeBackend {
    fn new(context: Result<Value, TransportError>) -> Self {
        Self {
            context,
            listing: Ok(vec![
                json!({"id": ModuleId::new(), "name": "Clientes", "status": 1}),
                json!({"id": ModuleId::new(), "name": "Inventario", "status": 0}),
            ]),
            listing_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AuthTransport for FakeBackend {
    async fn fetch_context(&self) -> Result<Value, TransportError> {
        self.context.clone()
    }

    async fn fetch_modules_page(&self, page: u32) -> Result<ModulePage, TransportError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.listing.clone()?;
        let content = rows
            .into_iter()
            .map(|row| serde_json::from_value(row).expect("well-formed fake row"))
            .collect::<Vec<_>>();
        Ok(ModulePage {
            content,
            page,
            size: 50,
            total_elements: 2,
            total_pages: 1,
        })
    }
}

fn session() -> (Arc<MemoryStorage>, Arc<SessionStore>) {
    let storage = Arc::new(MemoryStorage::new());
    let store = Arc::new(SessionStore::new(
        storage.clone() as Arc<dyn gestor_session::SessionStorage>
    ));
    (storage, store)
}

fn unified_context() -> Value {
    json!({
        "user": {"username": "mgarcia", "fullName": ""},
        "tenant": {"name": "Acme SA"},
        "roles": ["seller"],
        "modules": [{"key": "Clientes", "enabled": true}],
        "permissions": {"Clientes": ["READ"]},
        "serverTime": "2026-08-27T12:00:00Z",
    })
}

#[tokio::test]
async fn expired_token_redirects_to_login_and_erases_storage() {
    gestor_observability::init_for_tests();

    let (storage, store) = session();
    store.set_token(token_expiring_in(Duration::seconds(-10)), None);
    assert!(storage.get(TOKEN_KEY).is_some());

    let backend = Arc::new(FakeBackend::new(Ok(unified_context())));
    let guard = AuthGuard::new(ContextLoader::new(backend));

    let decision = guard.check(&store).await;
    assert_eq!(decision, GuardDecision::redirect(guards::LOGIN_ROUTE));
    assert_eq!(storage.get(TOKEN_KEY), None);
    assert_eq!(storage.get(STATE_KEY), None);
}

#[tokio::test]
async fn valid_token_loads_context_then_allows() {
    let (_, store) = session();
    store.set_token(token_expiring_in(Duration::hours(1)), None);

    let backend = Arc::new(FakeBackend::new(Ok(unified_context())));
    let guard = AuthGuard::new(ContextLoader::new(backend.clone()));

    assert!(guard.check(&store).await.is_allowed());
    assert!(store.has_context_loaded());
    // Alias resolution: `Clientes` grants the canonical CLIENT module.
    assert!(store.has_enabled_module("CLIENT"));
    assert!(store.can_read("Clientes"));
    // Blank full name fell back to the username on ingest.
    let user = store.snapshot().user.expect("user ingested");
    assert_eq!(user.full_name.as_deref(), Some("mgarcia"));

    // Second navigation: context already loaded, no further fetch needed.
    assert!(guard.check(&store).await.is_allowed());
}

#[tokio::test]
async fn context_endpoint_down_falls_back_to_legacy_listing() {
    let (_, store) = session();
    store.set_token(token_expiring_in(Duration::hours(1)), None);

    let backend = Arc::new(FakeBackend::new(Err(TransportError::Status(404))));
    let guard = AuthGuard::new(ContextLoader::new(backend.clone()));

    assert!(guard.check(&store).await.is_allowed());
    assert_eq!(backend.listing_calls.load(Ordering::SeqCst), 1);

    // Composed grants: active listing rows enabled, inactive rows present
    // but disabled; the pre-existing token survived.
    assert!(store.has_enabled_module("CLIENT"));
    assert!(!store.has_enabled_module("INVENTORY"));
    assert!(store.access_token().is_some());
}

#[tokio::test]
async fn both_endpoints_down_fails_closed_to_login() {
    let (storage, store) = session();
    store.set_token(token_expiring_in(Duration::hours(1)), None);

    let mut backend = FakeBackend::new(Err(TransportError::Unavailable("no /context".to_string())));
    backend.listing = Err(TransportError::Status(500));
    let guard = AuthGuard::new(ContextLoader::new(Arc::new(backend)));

    assert_eq!(
        guard.check(&store).await,
        GuardDecision::redirect(guards::LOGIN_ROUTE)
    );
    assert_eq!(storage.get(TOKEN_KEY), None);
}

#[tokio::test]
async fn module_guard_allows_entitled_and_redirects_otherwise() {
    let backend = Arc::new(FakeBackend::new(Ok(unified_context())));
    let cache = Arc::new(EntitlementCache::new(backend.clone()));
    let guard = ModuleGuard::new(cache);

    // No gate declared on the route.
    assert!(guard.check(None).await.is_allowed());

    assert!(guard.check(Some("Clientes")).await.is_allowed());
    assert_eq!(
        guard.check(Some("Inventario")).await,
        GuardDecision::redirect(guards::WELCOME_ROUTE)
    );
    assert_eq!(
        guard.check(Some("módulo desconocido")).await,
        GuardDecision::redirect(guards::WELCOME_ROUTE)
    );

    // The listing was fetched once and memoized across evaluations.
    assert_eq!(backend.listing_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn module_guard_fails_closed_when_listing_rejects() {
    let mut backend = FakeBackend::new(Ok(unified_context()));
    backend.listing = Err(TransportError::Status(503));
    let cache = Arc::new(EntitlementCache::new(Arc::new(backend)));
    let guard = ModuleGuard::new(cache.clone());

    assert_eq!(
        guard.check(Some("Clientes")).await,
        GuardDecision::redirect(guards::WELCOME_ROUTE)
    );
    assert!(cache.last_fetch_failed().await);
    assert!(!cache.is_loaded().await);
}

#[tokio::test]
async fn http_401_signal_matches_guard_detected_expiry() {
    let (storage, store) = session();
    store.set_token(token_expiring_in(Duration::hours(1)), None);

    let decision = on_unauthorized(&store);
    assert_eq!(decision, GuardDecision::redirect(guards::LOGIN_ROUTE));
    assert_eq!(storage.get(TOKEN_KEY), None);
    assert_eq!(storage.get(STATE_KEY), None);
}
