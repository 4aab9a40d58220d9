use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::{Session, User};

/// Fixed key the auth state is stored under
pub const STORAGE_NAMESPACE: &str = "q-mail-auth";

/// Bumped whenever the stored shape changes. Older blobs are discarded.
pub const SCHEMA_VERSION: u32 = 1;

/// Why a stored blob was refused.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("unreadable auth state: {0}")]
    Unreadable(#[from] serde_json::Error),

    #[error("auth state version {found} does not match {expected}")]
    Version { found: u32, expected: u32 },

    #[error("inconsistent auth state: {0}")]
    Inconsistent(&'static str),
}

/// Snapshot of who is signed in, mirrored to durable storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PersistedAuthState {
    pub session: Option<Session>,
    pub user: Option<User>,
    pub is_authenticated: bool,
}

#[derive(Serialize)]
struct StoredBlobRef<'a> {
    version: u32,
    #[serde(flatten)]
    state: &'a PersistedAuthState,
}

#[derive(Deserialize)]
struct StoredBlob {
    version: u32,
    #[serde(flatten)]
    state: PersistedAuthState,
}

impl PersistedAuthState {
    pub fn authenticated(session: Session, user: User) -> Self {
        Self {
            session: Some(session),
            user: Some(user),
            is_authenticated: true,
        }
    }

    pub fn to_blob(&self) -> serde_json::Result<String> {
        serde_json::to_string(&StoredBlobRef {
            version: SCHEMA_VERSION,
            state: self,
        })
    }

    /// Parse a stored blob, refusing anything that isn't a well-formed
    /// snapshot of the current schema.
    pub fn from_blob(blob: &str) -> Result<Self, RestoreError> {
        let stored: StoredBlob = serde_json::from_str(blob)?;

        if stored.version != SCHEMA_VERSION {
            return Err(RestoreError::Version {
                found: stored.version,
                expected: SCHEMA_VERSION,
            });
        }

        stored.state.validate()
    }

    /// Restore from storage, falling back to signed out on any mismatch.
    pub fn restore(blob: Option<&str>) -> Self {
        match blob.map(Self::from_blob) {
            None => Self::default(),
            Some(Ok(state)) => state,
            Some(Err(e)) => {
                warn!(error = %e, "Discarding persisted auth state");
                Self::default()
            }
        }
    }

    fn validate(self) -> Result<Self, RestoreError> {
        if let Some(ref session) = self.session {
            if session.access_token.trim().is_empty() {
                return Err(RestoreError::Inconsistent("session has an empty access token"));
            }
        }
        if self.user.is_some() && self.session.is_none() {
            return Err(RestoreError::Inconsistent("user stored without a session"));
        }
        if self.is_authenticated && (self.session.is_none() || self.user.is_none()) {
            return Err(RestoreError::Inconsistent("authenticated flag set without session and user"));
        }
        Ok(self)
    }
}
