//! Data models shared with the auth backend.
//!
//! - `Session`, `User`: the credential pair and the identity it authenticates
//! - `AuthPayload`, `UserResponse`: response envelopes from `/auth/*`
//! - `UserProfile`: the application profile row behind `/auth/profile`

pub mod profile;
pub mod session;

pub use profile::{GoogleSignInResponse, MessageResponse, SignUpRequest, UserProfile};
pub use session::{AuthPayload, Session, User, UserResponse};
