use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair for one authenticated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which the access token stops being accepted
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>, expires_at: Option<i64>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Sessions without an expiry are treated as live until the backend says otherwise.
    pub fn is_expired(&self) -> bool {
        self.expires_at().map(|at| Utc::now() >= at).unwrap_or(false)
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_at().map(|at| at - Utc::now())
    }

    /// Minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_in().map(|d| d.num_minutes().max(0))
    }
}

/// The identity a session authenticates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUser")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub email_confirmed_at: Option<String>,
}

impl User {
    /// Provider marks confirmed accounts with a non-empty confirmation timestamp.
    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_at
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Wire shape of a user. The provider nests the name in `user_metadata`;
/// the profile-merged session response carries `full_name` at top level.
#[derive(Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
}

#[derive(Deserialize)]
struct UserMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

impl From<RawUser> for User {
    fn from(raw: RawUser) -> Self {
        let (meta_name, meta_full_name) = raw
            .user_metadata
            .map(|m| (m.name, m.full_name))
            .unwrap_or((None, None));

        Self {
            id: raw.id,
            email: raw.email.unwrap_or_default(),
            name: raw.name.or(raw.full_name).or(meta_name).or(meta_full_name),
            email_confirmed_at: raw.email_confirmed_at,
        }
    }
}

/// `{ user, session }` as returned by signin, signup, code exchange and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserResponse {
    pub user: User,
}
