//! `gestor-session` — session state, entitlement cache, and route guards.
//!
//! The single logical-session engine behind the console: it holds the
//! authenticated identity, decides which business modules are usable, and
//! gates every protected navigation. Transport and routing frameworks stay
//! outside; they talk to this crate through the [`transport::AuthTransport`]
//! trait and the [`guards::GuardDecision`] contract.

pub mod context;
pub mod entitlements;
pub mod guards;
pub mod storage;
pub mod store;
pub mod transport;

pub use context::{AuthContext, ContextLoader, ContextPayload, TokenEnvelope};
pub use entitlements::EntitlementCache;
pub use guards::{
    ActiveBranchGuard, AuthGuard, BranchContext, GuardDecision, ModuleGuard, on_unauthorized,
};
pub use storage::{MemoryStorage, SessionStorage, STATE_KEY, TOKEN_KEY};
pub use store::{SessionState, SessionStore, TenantProfile, UserProfile};
pub use transport::{AuthTransport, TransportError};
