use serde::{Deserialize, Serialize};

/// Row from the application `users` table, served by `GET /auth/profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    pub last_login_at: Option<String>,
    pub last_active_at: Option<String>,
    #[cfg_attr(feature = "ts", ts(type = "unknown"))]
    pub preferences: Option<serde_json::Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl UserProfile {
    pub fn preferred_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.full_name.as_deref())
            .unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSignInResponse {
    pub url: String,
}
