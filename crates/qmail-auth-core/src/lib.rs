//! Client-side session management for the Q-Mail auth backend.
//!
//! The backend fronts a hosted identity provider; this crate keeps the
//! client's view of it:
//!
//! - [`auth::SessionStore`]: current user and tokens, login / logout /
//!   refresh / Google OAuth flows, persisted after every change
//! - [`api::AuthorizedClient`]: attaches the bearer token to requests and
//!   coalesces refreshes when concurrent requests hit an expired token
//! - [`router::RouteGuard`]: restores the session before the first
//!   navigation decision
//!
//! ```rust,ignore
//! let config = Config::load()?;
//! let api = ApiClient::from_config(&config)?;
//! let storage = storage::open(config.storage, config.storage_dir()?);
//! let store = SessionStore::new(api.clone(), storage, Box::new(navigator));
//! let client = AuthorizedClient::new(store.clone(), api);
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod router;
pub mod storage;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, AuthBackend, AuthorizedClient};
pub use auth::{AuthError, OAuthCallback, Operation, SessionStore};
pub use config::Config;
pub use models::{AuthPayload, Session, User, UserProfile};
pub use router::{Navigator, Route, RouteGuard};
pub use storage::{PersistedAuthState, StateStorage, StorageKind};
