//! Tenant-wide module entitlement cache.
//!
//! Fetches the full (paginated) module listing once and memoizes it.
//! Correctness property: single flight — concurrent `load_once` callers
//! converge on one upstream fetch and one resolved value. Failures are
//! swallowed (empty result, error flag recorded, not marked loaded) so the
//! next call retries.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use gestor_modules::{ModuleDto, canonical_key};

use crate::transport::{AuthTransport, TransportError};

type FlightResult = Option<Vec<ModuleDto>>;

#[derive(Default)]
struct CacheState {
    modules: Vec<ModuleDto>,
    loaded: bool,
    failed: bool,
    in_flight: Option<watch::Receiver<FlightResult>>,
}

/// Memoizing module-entitlement cache. Independent of the session store:
/// guards that gate on raw module enablement consume this directly.
pub struct EntitlementCache {
    transport: Arc<dyn AuthTransport>,
    state: Mutex<CacheState>,
}

enum Flight {
    Done(Vec<ModuleDto>),
    Lead(watch::Sender<FlightResult>),
    Join(watch::Receiver<FlightResult>),
}

impl EntitlementCache {
    pub fn new(transport: Arc<dyn AuthTransport>) -> Self {
        Self {
            transport,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Load the full module listing, memoized.
    ///
    /// The first caller walks every page; callers arriving while that fetch
    /// is in flight join it and observe the identical result. On failure
    /// every joined caller gets an empty sequence and `loaded` stays false.
    pub async fn load_once(&self) -> Vec<ModuleDto> {
        loop {
            let flight = {
                let mut state = self.state.lock().await;
                if state.loaded {
                    Flight::Done(state.modules.clone())
                } else if let Some(rx) = &state.in_flight {
                    Flight::Join(rx.clone())
                } else {
                    let (tx, rx) = watch::channel(None);
                    state.in_flight = Some(rx);
                    Flight::Lead(tx)
                }
            };

            match flight {
                Flight::Done(modules) => return modules,
                Flight::Lead(tx) => return self.lead_fetch(tx).await,
                Flight::Join(mut rx) => {
                    // Clone out of the watch `Ref` immediately so the guard
                    // (which is not `Send`) is not held across an await.
                    let outcome = rx
                        .wait_for(|result| result.is_some())
                        .await
                        .map(|result| result.clone());
                    match outcome {
                        Ok(result) => return result.unwrap_or_default(),
                        Err(_) => {
                            // Leader vanished without publishing (its future
                            // was dropped). Clear the stale slot and start over.
                            let mut state = self.state.lock().await;
                            let stale = state
                                .in_flight
                                .as_ref()
                                .is_some_and(|rx| rx.has_changed().is_err());
                            if stale {
                                state.in_flight = None;
                            }
                            continue;
                        }
                    }
                }
            }
        }
    }

    async fn lead_fetch(&self, tx: watch::Sender<FlightResult>) -> Vec<ModuleDto> {
        let fetched = self.fetch_all_pages().await;

        let modules = {
            let mut state = self.state.lock().await;
            state.in_flight = None;
            match fetched {
                Ok(modules) => {
                    state.modules = modules.clone();
                    state.loaded = true;
                    state.failed = false;
                    modules
                }
                Err(err) => {
                    tracing::error!(error = %err, "module entitlement fetch failed");
                    state.failed = true;
                    Vec::new()
                }
            }
        };

        let _ = tx.send(Some(modules.clone()));
        modules
    }

    /// Walk the upstream listing until every page is retrieved.
    async fn fetch_all_pages(&self) -> Result<Vec<ModuleDto>, TransportError> {
        let mut all = Vec::new();
        let mut page = 0;
        loop {
            let batch = self.transport.fetch_modules_page(page).await?;
            all.extend(batch.content.iter().cloned());
            if !batch.has_next() {
                return Ok(all);
            }
            page += 1;
        }
    }

    /// Whether an active entitlement exists for `canonical` (callers pass a
    /// canonical key; raw DTO names are normalized here).
    pub async fn has_enabled_module(&self, canonical: &str) -> bool {
        let state = self.state.lock().await;
        state.modules.iter().any(|dto| {
            dto.is_active() && canonical_key(&dto.name).as_deref() == Some(canonical)
        })
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.lock().await.loaded
    }

    pub async fn last_fetch_failed(&self) -> bool {
        self.state.lock().await.failed
    }

    /// Drop cached data and flags; the next `load_once` refetches.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.modules.clear();
        state.loaded = false;
        state.failed = false;
    }
}
