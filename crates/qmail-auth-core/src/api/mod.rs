//! REST API layer for the Q-Mail auth backend.
//!
//! - `AuthBackend`: the calls the session store makes against `/auth/*`
//! - `ApiClient`: the reqwest implementation of `AuthBackend`
//! - `AuthorizedClient`: attaches the current bearer token to outgoing
//!   requests and coordinates a single refresh-and-retry when they come
//!   back unauthorized

pub mod backend;
pub mod client;
pub mod error;
pub mod interceptor;

pub use backend::AuthBackend;
pub use client::ApiClient;
pub use error::ApiError;
pub use interceptor::AuthorizedClient;
