//! API client for the Q-Mail auth backend.
//!
//! `ApiClient` performs the raw `/auth/*` calls with explicit bearer tokens.
//! It holds no credentials of its own; the session store decides which token
//! each call carries.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{
    AuthPayload, GoogleSignInResponse, MessageResponse, SignUpRequest, User, UserProfile,
    UserResponse,
};

use super::{ApiError, AuthBackend};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow provider round trips while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) data requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the auth backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client against `base_url` (e.g. `http://localhost:3001/api`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(Self::default_headers())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_timeout(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send one request, attaching `token` as a bearer credential when present.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, path, authenticated = token.is_some(), "Sending request");
        let response = request.send().await?;
        Self::check_response(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response, path: &str) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e)))
    }

    async fn call<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, token, body).await?;
        Self::parse(response, path).await
    }

    /// Send a request, backing off and retrying while the server answers 429.
    async fn call_with_backoff<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match self.call(method.clone(), path, token, body).await {
                Err(ApiError::RateLimited(message)) => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited(message));
                    }
                    warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
                other => return other,
            }
        }
    }

    /// GET an application endpoint with an optional bearer token.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> Result<T, ApiError> {
        self.call_with_backoff::<T, ()>(Method::GET, path, token, None).await
    }

    /// POST a JSON body to an application endpoint with an optional bearer token.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        self.call_with_backoff(Method::POST, path, token, Some(body)).await
    }
}

impl AuthBackend for ApiClient {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthPayload, ApiError> {
        self.call(Method::POST, "/auth/signup", None, Some(request)).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let body = json!({ "email": email, "password": password });
        self.call(Method::POST, "/auth/signin", None, Some(&body)).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
        // Response body is empty; only the status matters
        self.send::<()>(Method::POST, "/auth/signout", Some(access_token), None)
            .await
            .map(|_| ())
    }

    async fn session_user(&self, access_token: &str) -> Result<User, ApiError> {
        let response: UserResponse = self
            .call::<_, ()>(Method::GET, "/auth/session", Some(access_token), None)
            .await?;
        Ok(response.user)
    }

    async fn google_sign_in_url(&self) -> Result<String, ApiError> {
        let response: GoogleSignInResponse = self
            .call::<_, ()>(Method::GET, "/auth/google/signin", None, None)
            .await?;
        Ok(response.url)
    }

    async fn google_user(&self, access_token: &str) -> Result<User, ApiError> {
        let response: UserResponse = self
            .call::<_, ()>(Method::GET, "/auth/google/user", Some(access_token), None)
            .await?;
        Ok(response.user)
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthPayload, ApiError> {
        let body = json!({ "code": code });
        self.call(Method::POST, "/auth/google/callback", None, Some(&body)).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, ApiError> {
        let body = json!({ "refresh_token": refresh_token });
        self.call(Method::POST, "/auth/refresh", None, Some(&body)).await
    }

    async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let body = json!({ "email": email });
        self.call(Method::POST, "/auth/forgot-password", None, Some(&body)).await
    }

    async fn verify_reset_code(&self, email: &str, code: &str) -> Result<MessageResponse, ApiError> {
        let body = json!({ "email": email, "code": code });
        self.call(Method::POST, "/auth/verify-reset-code", None, Some(&body)).await
    }

    async fn reset_password(&self, password: &str, recovery_token: &str) -> Result<MessageResponse, ApiError> {
        let body = json!({ "password": password });
        self.call(Method::POST, "/auth/reset-password", Some(recovery_token), Some(&body))
            .await
    }

    async fn profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        self.get_json("/auth/profile", Some(access_token)).await
    }
}
