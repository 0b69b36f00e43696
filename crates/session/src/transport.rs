//! Transport boundary.
//!
//! The HTTP layer lives outside this crate; the engine only sees these two
//! upstream operations. Tests supply in-memory implementations.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use gestor_modules::ModulePage;

/// Failure at the transport boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Endpoint missing or unreachable (legacy backends lack the unified
    /// context endpoint entirely).
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// Upstream answered with a non-success status.
    #[error("request failed with status {0}")]
    Status(u16),

    /// Upstream answered with a body the caller cannot use.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Upstream operations the session engine consumes.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// `GET` the unified "who am I / what can I do" context.
    ///
    /// Returns the raw JSON document; shape tolerance is handled by
    /// [`crate::context::ContextPayload::decode`].
    async fn fetch_context(&self) -> Result<Value, TransportError>;

    /// `GET` one page of the tenant-wide module listing.
    async fn fetch_modules_page(&self, page: u32) -> Result<ModulePage, TransportError>;
}
