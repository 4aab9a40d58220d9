//! Scripted stand-ins for the auth backend, storage and navigation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::api::{ApiError, AuthBackend};
use crate::auth::SessionStore;
use crate::models::{AuthPayload, MessageResponse, Session, SignUpRequest, User, UserProfile};
use crate::router::{Navigator, Route};
use crate::storage::{MemoryStorage, PersistedAuthState};

pub(crate) fn confirmed_user() -> User {
    User {
        id: "1".to_string(),
        email: "a@b.com".to_string(),
        name: None,
        email_confirmed_at: Some("2024-01-01".to_string()),
    }
}

pub(crate) fn unconfirmed_user() -> User {
    User {
        email_confirmed_at: None,
        ..confirmed_user()
    }
}

pub(crate) fn session(access_token: &str, refresh_token: Option<&str>) -> Session {
    Session::new(access_token, refresh_token.map(str::to_string), Some(999))
}

/// Store seeded as signed in with `session` and [`confirmed_user`].
pub(crate) fn signed_in_store(backend: MockBackend, session: Session) -> SessionStore<MockBackend> {
    let state = PersistedAuthState::authenticated(session, confirmed_user());
    store_with(backend, state).0
}

pub(crate) fn store_with(
    backend: MockBackend,
    state: PersistedAuthState,
) -> (SessionStore<MockBackend>, MemoryStorage, RecordingNavigator) {
    let storage = MemoryStorage::with_blob(state.to_blob().unwrap());
    let navigator = RecordingNavigator::default();
    let store = SessionStore::new(backend, Box::new(storage.clone()), Box::new(navigator.clone()));
    (store, storage, navigator)
}

#[derive(Clone, Default)]
pub(crate) struct RecordingNavigator {
    routes: Arc<Mutex<Vec<Route>>>,
}

impl RecordingNavigator {
    pub(crate) fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().unwrap().push(route);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum SignOut {
    #[default]
    Succeed,
    Fail,
    Hang,
}

/// Backend double. Tokens in `accepted` are valid for user lookups;
/// a configured refresh session is handed out on every refresh and its
/// access token becomes valid.
#[derive(Default)]
pub(crate) struct MockBackend {
    user: Mutex<Option<User>>,
    accepted: Mutex<HashSet<String>>,
    sign_in: Mutex<Option<Result<AuthPayload, ApiError>>>,
    refresh_session: Mutex<Option<Session>>,
    exchange: Mutex<Option<AuthPayload>>,
    sign_out: Mutex<SignOut>,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    session_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    google_user_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    profile_calls: AtomicUsize,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_user(self, user: User) -> Self {
        *self.user.lock().unwrap() = Some(user);
        self
    }

    pub(crate) fn accept_token(self, token: &str) -> Self {
        self.accepted.lock().unwrap().insert(token.to_string());
        self
    }

    pub(crate) fn with_sign_in(self, result: Result<AuthPayload, ApiError>) -> Self {
        *self.sign_in.lock().unwrap() = Some(result);
        self
    }

    pub(crate) fn with_refresh(self, session: Session) -> Self {
        *self.refresh_session.lock().unwrap() = Some(session);
        self
    }

    pub(crate) fn with_exchange(self, payload: AuthPayload) -> Self {
        *self.exchange.lock().unwrap() = Some(payload);
        self
    }

    pub(crate) fn with_sign_out(self, behavior: SignOut) -> Self {
        *self.sign_out.lock().unwrap() = behavior;
        self
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn google_user_calls(&self) -> usize {
        self.google_user_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    fn user_for(&self, token: &str) -> Result<User, ApiError> {
        if !self.accepted.lock().unwrap().contains(token) {
            return Err(ApiError::Unauthorized(Some("Invalid session".to_string())));
        }
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or(ApiError::NotFound(None))
    }
}

impl AuthBackend for MockBackend {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthPayload, ApiError> {
        if request.password.len() < 6 {
            return Err(ApiError::BadRequest(Some(
                "Password must be at least 6 characters".to_string(),
            )));
        }
        Ok(AuthPayload {
            user: Some(User {
                email: request.email.clone(),
                name: request.name.clone(),
                ..unconfirmed_user()
            }),
            session: None,
            message: Some("Registration successful. Please check your email for verification.".to_string()),
        })
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthPayload, ApiError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.sign_in
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(ApiError::Unauthorized(Some("Invalid login credentials".to_string()))))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), ApiError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.sign_out.lock().unwrap();
        match behavior {
            SignOut::Succeed => Ok(()),
            SignOut::Fail => Err(ApiError::ServerError {
                message: None,
                body: String::new(),
            }),
            SignOut::Hang => std::future::pending().await,
        }
    }

    async fn session_user(&self, access_token: &str) -> Result<User, ApiError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.user_for(access_token)
    }

    async fn google_sign_in_url(&self) -> Result<String, ApiError> {
        Ok("https://accounts.google.com/o/oauth2/v2/auth?client_id=test".to_string())
    }

    async fn google_user(&self, access_token: &str) -> Result<User, ApiError> {
        self.google_user_calls.fetch_add(1, Ordering::SeqCst);
        self.user_for(access_token)
    }

    async fn exchange_code(&self, _code: &str) -> Result<AuthPayload, ApiError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Unauthorized(Some("invalid flow state".to_string())))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<AuthPayload, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let session = self.refresh_session.lock().unwrap().clone();
        match session {
            Some(session) => {
                self.accepted.lock().unwrap().insert(session.access_token.clone());
                Ok(AuthPayload {
                    user: None,
                    session: Some(session),
                    message: None,
                })
            }
            None => Err(ApiError::Unauthorized(Some("Invalid Refresh Token".to_string()))),
        }
    }

    async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, ApiError> {
        if email != confirmed_user().email {
            return Err(ApiError::BadRequest(Some("User not found".to_string())));
        }
        Ok(MessageResponse {
            message: "Password reset instructions have been sent to your email".to_string(),
        })
    }

    async fn verify_reset_code(&self, _email: &str, code: &str) -> Result<MessageResponse, ApiError> {
        if code != "123456" {
            return Err(ApiError::BadRequest(None));
        }
        Ok(MessageResponse {
            message: "Code verified".to_string(),
        })
    }

    async fn reset_password(&self, _password: &str, recovery_token: &str) -> Result<MessageResponse, ApiError> {
        if !self.accepted.lock().unwrap().contains(recovery_token) {
            return Err(ApiError::BadRequest(Some("Invalid or expired reset token".to_string())));
        }
        Ok(MessageResponse {
            message: "Password has been reset successfully".to_string(),
        })
    }

    async fn profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let user = self.user_for(access_token)?;
        Ok(UserProfile {
            id: user.id,
            email: user.email,
            full_name: user.name,
            display_name: None,
            profile_image_url: None,
            is_verified: true,
            last_login_at: None,
            last_active_at: None,
            preferences: None,
            created_at: None,
            updated_at: None,
        })
    }
}
