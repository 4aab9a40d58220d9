use std::future::Future;

use crate::models::{AuthPayload, MessageResponse, SignUpRequest, User, UserProfile};

use super::ApiError;

/// Calls against the auth backend. Everything past this boundary
/// (password checks, token issuance, provider SDK) is the backend's concern.
pub trait AuthBackend: Send + Sync + 'static {
    /// `POST /auth/signup`
    fn sign_up(&self, request: &SignUpRequest) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send;

    /// `POST /auth/signin`
    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send;

    /// `POST /auth/signout`
    fn sign_out(&self, access_token: &str) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `GET /auth/session`: validate an access token and return its user.
    fn session_user(&self, access_token: &str) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// `GET /auth/google/signin`: provider URL to start the OAuth round trip.
    fn google_sign_in_url(&self) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// `GET /auth/google/user`: user behind a token delivered in the callback fragment.
    fn google_user(&self, access_token: &str) -> impl Future<Output = Result<User, ApiError>> + Send;

    /// `POST /auth/google/callback`: exchange an authorization code for a session.
    fn exchange_code(&self, code: &str) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send;

    /// `POST /auth/refresh`
    fn refresh(&self, refresh_token: &str) -> impl Future<Output = Result<AuthPayload, ApiError>> + Send;

    /// `POST /auth/forgot-password`
    fn request_password_reset(&self, email: &str) -> impl Future<Output = Result<MessageResponse, ApiError>> + Send;

    /// `POST /auth/verify-reset-code`
    fn verify_reset_code(&self, email: &str, code: &str) -> impl Future<Output = Result<MessageResponse, ApiError>> + Send;

    /// `POST /auth/reset-password`, authorized by the recovery token from the reset email.
    fn reset_password(&self, password: &str, recovery_token: &str) -> impl Future<Output = Result<MessageResponse, ApiError>> + Send;

    /// `GET /auth/profile`
    fn profile(&self, access_token: &str) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;
}
