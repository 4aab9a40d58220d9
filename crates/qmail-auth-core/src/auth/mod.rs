//! Authentication state for the Q-Mail client.
//!
//! This module provides:
//! - `SessionStore`: who is signed in and with which tokens, plus the
//!   login / logout / refresh / OAuth flows that change it
//! - `OAuthCallback`: the two shapes a Google sign-in can complete with
//! - `AuthError`: the failures surfaced to the UI, with display messages
//!
//! Tokens are not expired on a timer; an expired access token is discovered
//! when the backend rejects it, and the request interceptor refreshes it.

pub mod callback;
pub mod error;
pub mod store;

pub use callback::OAuthCallback;
pub use error::{AuthError, Operation};
pub use store::SessionStore;
