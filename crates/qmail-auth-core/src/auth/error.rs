use thiserror::Error;

use crate::api::ApiError;

/// Failures surfaced to the UI layer. Each variant carries the message to
/// display: the server's own wording when it sent one, else a fixed fallback
/// for the operation that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    UnverifiedAccount(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    TokenExpiredOrInvalid(String),

    #[error("{0}")]
    RefreshFailed(String),

    #[error("{0}")]
    InvalidCallback(String),

    #[error("{0}")]
    UpstreamUnavailable(String),
}

impl AuthError {
    pub fn message(&self) -> &str {
        match self {
            AuthError::InvalidCredentials(m)
            | AuthError::UnverifiedAccount(m)
            | AuthError::RateLimited(m)
            | AuthError::TokenExpiredOrInvalid(m)
            | AuthError::RefreshFailed(m)
            | AuthError::InvalidCallback(m)
            | AuthError::UpstreamUnavailable(m) => m,
        }
    }

    pub fn unverified() -> Self {
        AuthError::UnverifiedAccount("Please verify your email address".to_string())
    }

    pub fn invalid_callback() -> Self {
        AuthError::InvalidCallback("Invalid callback parameters".to_string())
    }
}

/// Operations that talk to the auth backend, each with its fallback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Register,
    Refresh,
    GoogleSignIn,
    GoogleCallback,
    RequestPasswordReset,
    VerifyResetCode,
    ResetPassword,
    Profile,
    /// Any other protected application request
    Request,
}

impl Operation {
    pub fn fallback_message(self) -> &'static str {
        match self {
            Operation::Login => "Invalid email or password",
            Operation::Register => "Registration failed",
            Operation::Refresh => "Session expired, please sign in again",
            Operation::GoogleSignIn => "Google sign in failed",
            Operation::GoogleCallback => "Failed to complete Google sign in",
            Operation::RequestPasswordReset => "Failed to send reset instructions",
            Operation::VerifyResetCode => "Invalid reset code",
            Operation::ResetPassword => "Failed to reset password",
            Operation::Profile => "Failed to load profile",
            Operation::Request => "Request failed",
        }
    }

    /// Map a transport error into the taxonomy for this operation.
    pub fn normalize(self, err: ApiError) -> AuthError {
        let message = err
            .upstream_message()
            .map(str::to_string)
            .unwrap_or_else(|| self.fallback_message().to_string());

        match (&err, self) {
            (ApiError::RateLimited(_), _) => AuthError::RateLimited(message),
            (ApiError::Unauthorized(_), Operation::Login) => AuthError::InvalidCredentials(message),
            (ApiError::Unauthorized(_), Operation::Refresh) => AuthError::RefreshFailed(message),
            (ApiError::Unauthorized(_), _) => AuthError::TokenExpiredOrInvalid(message),
            (_, Operation::Refresh) => AuthError::RefreshFailed(message),
            _ => AuthError::UpstreamUnavailable(message),
        }
    }
}
